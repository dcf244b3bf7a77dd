#[tokio::main]
async fn main() -> std::io::Result<()> {
    visit_triage_lib::run().await
}
