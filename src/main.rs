#[actix_web::main]
async fn main() -> std::io::Result<()> {
    research_fund_server::run().await
}
