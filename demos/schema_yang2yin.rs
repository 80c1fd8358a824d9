use yang_core::context::{Context, ContextFlags};
use yang_core::schema::{SchemaOutputFormat, SchemaPrinterFlags};

static SEARCH_DIR: &str = "./assets/yang/";
static MODULE_NAME: &str = "ietf-ip";

fn main() -> std::io::Result<()> {
    // Initialize context.
    let mut ctx = Context::new_with_searchdirs(
        ContextFlags::NO_YANGLIBRARY,
        &[SEARCH_DIR],
    )
    .expect("Failed to create context");

    // Load test module.
    let module = ctx
        .load_module(MODULE_NAME, None, &[])
        .expect("Failed to load module");

    // Print test module.
    module
        .print_file(
            std::io::stdout(),
            SchemaOutputFormat::YIN,
            SchemaPrinterFlags::empty(),
        )
        .expect("Failed to print module");

    Ok(())
}
