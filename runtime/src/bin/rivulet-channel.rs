//! Channel processor binary
//!
//! ```bash
//! APP_ID=channel-1 CHANNEL_STREAM_INFO='pubsub|orders' CHANNEL_TARGET=pricing/compute \
//!     rivulet-channel
//! ```

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rivulet_runtime::run_channel().await
}
