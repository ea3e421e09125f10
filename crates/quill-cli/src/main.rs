//! `quill` binary entrypoint.

#[tokio::main]
async fn main() {
    let code = quill_cli::run().await;
    if code != 0 {
        std::process::exit(code);
    }
}
