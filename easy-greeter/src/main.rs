use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    easy_greeter::app(std::env::args())
        .build_info(easy_common::version_line(env!("CARGO_PKG_VERSION")))
        .run()
        .await?;
    Ok(())
}
