use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::llm::ReplyGenerator;
use crate::platform::{Messenger, Request, Update};
use crate::vision::ImageClassifier;

/// How a single update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to answer: no chat id, or neither text nor photo.
    Ignored,
    Replied,
    /// A stage failed and the reply was dropped after logging.
    Dropped,
}

/// Routes inbound updates to the generator or the classifier and sends the
/// reply back. All collaborators are injected.
pub struct Bot {
    generator: Arc<dyn ReplyGenerator>,
    classifier: Arc<dyn ImageClassifier>,
    messenger: Arc<dyn Messenger>,
}

impl Bot {
    pub fn new(
        generator: Arc<dyn ReplyGenerator>,
        classifier: Arc<dyn ImageClassifier>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            generator,
            classifier,
            messenger,
        }
    }

    /// Handle one update. Failures are logged here and never returned.
    pub async fn handle(&self, update: Update) -> Outcome {
        let update_id = update.update_id;
        let request = match update.into_request() {
            Some(request) => request,
            None => {
                debug!("Ignoring update {:?}: no chat id or content", update_id);
                return Outcome::Ignored;
            }
        };

        let chat_id = request.chat_id().clone();
        info!("Handling {} message in chat {}", request.kind(), chat_id);

        let reply = match self.compose(request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to compose reply for chat {}: {:#}", chat_id, e);
                return Outcome::Dropped;
            }
        };

        if let Err(e) = self.messenger.send_message(&chat_id, &reply).await {
            error!("Failed to send reply to chat {}: {:#}", chat_id, e);
            return Outcome::Dropped;
        }

        Outcome::Replied
    }

    async fn compose(&self, request: Request) -> Result<String> {
        match request {
            Request::Text { text, .. } => self.generator.generate(&text).await,
            Request::Photo { file_id, .. } => {
                let file_path = self.messenger.get_file_path(&file_id).await?;
                let bytes = self.messenger.download_file(&file_path).await?;
                debug!("Downloaded {} bytes for file {}", bytes.len(), file_id);

                let classifier = Arc::clone(&self.classifier);
                tokio::task::spawn_blocking(move || classifier.classify(&bytes))
                    .await
                    .context("Classifier task panicked")?
            }
        }
    }
}
