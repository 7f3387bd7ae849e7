//! Joiner binary
//!
//! ```bash
//! JOINER_STREAMS_INFO='pubsub|orders;pubsub|payments' \
//!     JOINER_FILTER_EXPRESSION='orders.id == payments.order_id' \
//!     JOINER_STREAM_TARGET=pubsub/paid-orders \
//!     rivulet-joiner
//! ```

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rivulet_runtime::run_joiner().await
}
