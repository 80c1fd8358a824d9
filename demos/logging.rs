use log::LevelFilter;
use yang_core::context::{Context, ContextFlags};
use yang_core::logging::LogLevel;

fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::max())
        .init();
    let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
    ctx.set_log_level(LogLevel::Debug);
    ctx.init_default_logger();
    ctx.set_searchdir("./assets/yang/").unwrap();
    // When loading modules, we should see some logs
    let _module = ctx.load_module("acme-system", None, &[]).unwrap();
    // Failures are logged as errors
    let _ = ctx.load_module("does-not-exist", None, &[]);
}
