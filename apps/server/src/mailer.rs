use async_trait::async_trait;
use tracing::info;

use compost_control::{Notice, NoticeTransport, Result};

/// Writes notices to the log. Stands in for a mail relay, which is run
/// outside this process.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl NoticeTransport for LogTransport {
    async fn send_notice(&self, notice: &Notice) -> Result<()> {
        info!(
            to = %notice.recipient_address,
            subject = %notice.subject,
            "notice for {}:\n{}",
            notice.recipient_name,
            notice.body
        );
        Ok(())
    }
}
