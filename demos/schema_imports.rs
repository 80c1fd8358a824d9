use yang_core::context::{Context, ContextFlags};
use yang_core::schema::SchemaInputFormat;

static SEARCH_DIR: &str = "./assets/yang/";
static MODULE_NAME: &str = "ietf-ip";
static MODULE_FILE: &str = "./assets/yang/ietf-ip@2018-02-22.yang";

fn main() -> std::io::Result<()> {
    // Initialize context
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY)
        .expect("Failed to create context");

    // Set search directory
    ctx.set_searchdir(SEARCH_DIR)
        .expect("Failed to set YANG search directory");

    // Parse the module without compiling it, to get its import statements
    let source = std::fs::read_to_string(MODULE_FILE)?;
    let parsed = ctx
        .parse_module_parsed_only(&source, SchemaInputFormat::YANG)
        .expect("Failed to parse module");

    // Load the module, together with its imports
    ctx.load_module(MODULE_NAME, None, &[])
        .expect("Failed to load module");

    println!("Module '{}' imports:\n", parsed.name);

    for import in &parsed.imports {
        println!("  Import: {}", import.module);
        println!("    Prefix: {}", import.prefix);

        if let Some(revision) = &import.revision {
            println!("    Revision date: {}", revision);
        }

        let Some(imported_module) = ctx.get_module_latest(&import.module) else {
            continue;
        };
        println!("      Name: {}", imported_module.name());
        println!("      Namespace: {}", imported_module.namespace());
        println!("      Implemented: {}", imported_module.is_implemented());

        if let Some(filepath) = imported_module.filepath() {
            println!("      File path: {}", filepath);
        }

        if let Some(revision) = imported_module.revision() {
            println!("      Revision: {}", revision);
        }

        if let Some(description) = imported_module.description() {
            let description_oneline =
                description.replace('\n', " ").replace('\r', " ");
            println!("      Description: {}", description_oneline);
        }
        println!()
    }

    Ok(())
}
