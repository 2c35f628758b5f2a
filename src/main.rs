#[tokio::main]
async fn main() {
    if let Err(e) = clinica_lib::run().await {
        eprintln!("clinica: {e}");
        std::process::exit(1);
    }
}
