mod api;
mod arguments;
mod run;

#[tokio::main]
async fn main() {
    let args = <arguments::Arguments as clap::Parser>::parse();
    observe::tracing::initialize("skus=debug,skus_core=debug", tracing::Level::INFO.into(), args.log_json);
    observe::panic_hook::install();
    observe::metrics::setup_registry(Some("skus".to_string()), None);

    if let Err(err) = run::run(args).await {
        tracing::error!(?err, "skus terminated with an error");
        std::process::exit(1);
    }
}
