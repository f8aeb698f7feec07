use admissions_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("admissions service error: {err}");
        std::process::exit(1);
    }
}
