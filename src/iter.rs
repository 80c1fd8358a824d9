//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG iterators.

use crate::context::Context;
use crate::data::Metadata;
use crate::ids::ModuleId;
use crate::schema::SchemaModule;
use crate::utils::Binding;

/// Common methods used by multiple data and schema node iterators.
#[doc(hidden)]
pub trait NodeIterable<'a>: Sized + Clone + PartialEq + Binding<'a> {
    /// Returns the parent node.
    fn parent(&self) -> Option<Self>;

    /// Returns the next sibling node.
    fn next_sibling(&self) -> Option<Self>;

    /// Returns the fist child none.
    fn first_child(&self) -> Option<Self>;
}

/// An iterator over the sibings of a node.
#[derive(Debug)]
pub struct Siblings<'a, T>
where
    T: NodeIterable<'a>,
{
    next: Option<T>,
    _marker: std::marker::PhantomData<&'a T>,
}

/// An iterator over the ancestors of a node.
#[derive(Debug)]
pub struct Ancestors<'a, T>
where
    T: NodeIterable<'a>,
{
    next: Option<T>,
    _marker: std::marker::PhantomData<&'a T>,
}

/// An iterator over all elements in a tree (depth-first search algorithm).
///
/// When traversing over schema trees, note that _actions_ and _notifications_
/// are ignored.
#[derive(Debug)]
pub struct Traverse<'a, T>
where
    T: NodeIterable<'a>,
{
    start: T,
    next: Option<T>,
    _marker: std::marker::PhantomData<&'a T>,
}

/// An iterator over a set of nodes, as returned by XPath and path lookups.
#[derive(Debug)]
pub struct Set<'a, T>
where
    T: NodeIterable<'a>,
{
    items: std::vec::IntoIter<T>,
    _marker: std::marker::PhantomData<&'a T>,
}

/// An iterator over the modules of a context, in load order.
#[derive(Debug)]
pub struct SchemaModules<'a> {
    context: &'a Context,
    index: usize,
    skip_internal: bool,
}

/// An iterator over a list of metadata.
#[derive(Debug)]
pub struct MetadataList<'a> {
    items: std::vec::IntoIter<Metadata<'a>>,
}

// ===== impl Siblings =====

impl<'a, T> Siblings<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(next: Option<T>) -> Siblings<'a, T> {
        Siblings {
            next,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, T> Iterator for Siblings<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let ret = self.next.clone();
        if let Some(next) = &self.next {
            self.next = next.next_sibling();
        }
        ret
    }
}

// ===== impl Ancestors =====

impl<'a, T> Ancestors<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(next: Option<T>) -> Ancestors<'a, T> {
        Ancestors {
            next,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, T> Iterator for Ancestors<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let node = self.next.clone();
        if let Some(next) = &self.next {
            self.next = next.parent();
        }
        node
    }
}

// ===== impl Traverse =====

impl<'a, T> Traverse<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(start: T) -> Traverse<'a, T> {
        let next = start.clone();

        Traverse {
            start,
            next: Some(next),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, T> Iterator for Traverse<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let ret = self.next.clone();

        if let Some(next) = &mut self.next {
            // Select element for the next run - children first.
            *next = match next.first_child() {
                Some(child) => child,
                None => {
                    // No children.
                    if *next == self.start {
                        self.next = None;
                        return ret;
                    }

                    // Try siblings.
                    loop {
                        match next.next_sibling() {
                            Some(iter) => break iter,
                            None => {
                                // Parent is already processed, go to its
                                // sibling.
                                let Some(parent) = next.parent() else {
                                    self.next = None;
                                    return ret;
                                };
                                *next = parent;

                                // If no siblings, go back through parents.
                                if *next != self.start {
                                    continue;
                                }

                                // We are done, no next element to process.
                                self.next = None;
                                return ret;
                            }
                        }
                    }
                }
            }
        }
        ret
    }
}

// ===== impl Set =====

impl<'a, T> Set<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(items: Vec<T>) -> Set<'a, T> {
        Set {
            items: items.into_iter(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, T> Iterator for Set<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<'a, T> ExactSizeIterator for Set<'a, T> where T: NodeIterable<'a> {}

// ===== impl SchemaModules =====

impl<'a> SchemaModules<'a> {
    pub fn new(context: &'a Context, skip_internal: bool) -> SchemaModules<'a> {
        SchemaModules {
            context,
            index: 0,
            skip_internal,
        }
    }
}

impl<'a> Iterator for SchemaModules<'a> {
    type Item = SchemaModule<'a>;

    fn next(&mut self) -> Option<SchemaModule<'a>> {
        loop {
            if self.index >= self.context.module_count() {
                return None;
            }
            let id = ModuleId::from_index(self.index);
            self.index += 1;
            if self.skip_internal && self.context.is_internal_module(id) {
                continue;
            }
            return Some(SchemaModule::from_id(self.context, id));
        }
    }
}

// ===== impl MetadataList =====

impl<'a> MetadataList<'a> {
    pub fn new(items: Vec<Metadata<'a>>) -> MetadataList<'a> {
        MetadataList {
            items: items.into_iter(),
        }
    }
}

impl<'a> Iterator for MetadataList<'a> {
    type Item = Metadata<'a>;

    fn next(&mut self) -> Option<Metadata<'a>> {
        self.items.next()
    }
}
