use yang_core::context::{Context, ContextFlags};
use yang_core::schema::SchemaPathFormat;

static SEARCH_DIR: &str = "./assets/yang/";
static MODULE_NAME: &str = "yolo-system";

fn main() -> std::io::Result<()> {
    // Initialize context.
    let mut ctx = Context::new_with_searchdirs(
        ContextFlags::NO_YANGLIBRARY,
        &[SEARCH_DIR],
    )
    .expect("Failed to create context");

    // Load test module.
    ctx.load_module(MODULE_NAME, None, &["*"])
        .expect("Failed to load module");
    let module = ctx
        .get_module_implemented(MODULE_NAME)
        .expect("Failed to find module");

    // Iterate over all schema nodes that belong to the test module and print
    // their full paths.
    println!("Data (DFS iteration):");
    for snode in ctx
        .traverse()
        .filter(|snode| snode.module().name() == MODULE_NAME)
    {
        println!("  {}", snode.path(SchemaPathFormat::DATA));
    }

    println!("RPCs:");
    for snode in module.rpcs() {
        println!("  {}", snode.path(SchemaPathFormat::DATA));
    }

    println!("Actions:");
    for snode in module.traverse().flat_map(|snode| snode.actions()) {
        println!("  {}", snode.path(SchemaPathFormat::DATA));
    }

    println!("Notifications:");
    for snode in module.notifications() {
        println!("  {}", snode.path(SchemaPathFormat::DATA));
    }

    Ok(())
}
