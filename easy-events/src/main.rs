//! easy-events service binary
//!
//! Besides serving, understands `--dump-config`, `--dump-schema` and
//! `--dump-db-schema` for test fixtures.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    easy_events::app(std::env::args())
        .build_info(easy_common::version_line(env!("CARGO_PKG_VERSION")))
        .run()
        .await?;

    Ok(())
}
