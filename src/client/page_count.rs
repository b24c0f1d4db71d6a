//! Page counting for uploaded documents.
//!
//! Counting runs in spawned tasks keyed by file id. Results come back over a channel
//! and the owner decides whether the file still exists; removing a file aborts its
//! task. A failed count resolves to a single page.

use crate::{
    core::cart::Upload,
    errors::{Error, Result},
};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

/// The page-counting service
#[async_trait]
pub trait PageCounter: Send + Sync {
    /// Pages in `upload`.
    async fn count_pages(&self, upload: &Upload) -> Result<u32>;
}

/// Counts PDF page objects; every other upload is one page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPageCounter;

impl HeuristicPageCounter {
    fn is_pdf(upload: &Upload) -> bool {
        upload.mime_type.eq_ignore_ascii_case("application/pdf")
            || upload.name.to_ascii_lowercase().ends_with(".pdf")
            || upload.data.starts_with(b"%PDF")
    }

    /// Number of `/Type /Page` objects, not counting `/Type /Pages` trees.
    fn count_pdf_pages(data: &[u8]) -> usize {
        let mut count = 0;
        let mut rest = data;
        while let Some(at) = find(rest, b"/Type") {
            rest = &rest[at + b"/Type".len()..];
            let trimmed = trim_start(rest);
            if let Some(after) = trimmed.strip_prefix(b"/Page") {
                if after.first().is_none_or(|b| !b.is_ascii_alphanumeric()) {
                    count += 1;
                }
            }
        }
        count
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    &bytes[skip..]
}

#[async_trait]
impl PageCounter for HeuristicPageCounter {
    async fn count_pages(&self, upload: &Upload) -> Result<u32> {
        if !Self::is_pdf(upload) {
            return Ok(1);
        }
        match Self::count_pdf_pages(&upload.data) {
            0 => Err(Error::validation(format!(
                "no pages found in '{}'",
                upload.name
            ))),
            n => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }
}

/// A resolved count for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCountResult {
    /// File the count belongs to
    pub file_id: String,
    /// Pages, at least 1
    pub page_count: u32,
}

/// Schedules and tracks page-count tasks
pub struct PageCountResolver {
    counter: Arc<dyn PageCounter>,
    tasks: HashMap<String, JoinHandle<()>>,
    sender: mpsc::UnboundedSender<PageCountResult>,
    receiver: mpsc::UnboundedReceiver<PageCountResult>,
}

impl PageCountResolver {
    /// Resolver using `counter`.
    #[must_use]
    pub fn new(counter: Arc<dyn PageCounter>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            counter,
            tasks: HashMap::new(),
            sender,
            receiver,
        }
    }

    /// Starts counting `upload` for `file_id`, replacing any earlier task for it.
    pub fn schedule(&mut self, file_id: String, upload: Upload) {
        let counter = Arc::clone(&self.counter);
        let sender = self.sender.clone();
        let id = file_id.clone();

        let handle = tokio::spawn(async move {
            let page_count = match counter.count_pages(&upload).await {
                Ok(n) if n > 0 => n,
                Ok(_) => {
                    warn!(file_id = %id, "Page counter reported 0 pages, using 1");
                    1
                }
                Err(e) => {
                    warn!(file_id = %id, "Page count failed, using 1: {e}");
                    1
                }
            };
            // The receiver lives as long as the resolver; a send error means it is gone.
            let _ = sender.send(PageCountResult {
                file_id: id,
                page_count,
            });
        });

        if let Some(previous) = self.tasks.insert(file_id, handle) {
            previous.abort();
        }
    }

    /// Aborts the task for `file_id`. Returns `true` if one was pending.
    pub fn cancel(&mut self, file_id: &str) -> bool {
        self.tasks.remove(file_id).is_some_and(|handle| {
            handle.abort();
            debug!(file_id, "Cancelled page count");
            true
        })
    }

    /// Tasks whose result has not been collected yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// A finished result, without waiting.
    pub fn try_next(&mut self) -> Option<PageCountResult> {
        while let Ok(result) = self.receiver.try_recv() {
            if self.tasks.remove(&result.file_id).is_some() {
                return Some(result);
            }
        }
        None
    }

    /// Waits for the next result; `None` once nothing is pending.
    pub async fn next(&mut self) -> Option<PageCountResult> {
        while !self.tasks.is_empty() {
            let result = self.receiver.recv().await?;
            if self.tasks.remove(&result.file_id).is_some() {
                return Some(result);
            }
        }
        None
    }
}

impl Drop for PageCountResolver {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fake_pdf;
    use std::time::Duration;

    struct SlowCounter;

    #[async_trait]
    impl PageCounter for SlowCounter {
        async fn count_pages(&self, _upload: &Upload) -> Result<u32> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(9)
        }
    }

    struct BrokenCounter;

    #[async_trait]
    impl PageCounter for BrokenCounter {
        async fn count_pages(&self, _upload: &Upload) -> Result<u32> {
            Err(Error::validation("corrupt file"))
        }
    }

    #[tokio::test]
    async fn test_heuristic_counts_pdf_pages() -> Result<()> {
        let counter = HeuristicPageCounter;
        let pdf = Upload::new("notes.pdf", "application/pdf", fake_pdf(5));
        assert_eq!(counter.count_pages(&pdf).await?, 5);

        let compact = Upload::new("a.pdf", "application/pdf", b"%PDF /Type/Page /Type/Pages".to_vec());
        assert_eq!(counter.count_pages(&compact).await?, 1);

        let image = Upload::new("photo.png", "image/png", vec![0x89, b'P', b'N', b'G']);
        assert_eq!(counter.count_pages(&image).await?, 1);

        let empty = Upload::new("empty.pdf", "application/pdf", b"%PDF-1.4".to_vec());
        assert!(counter.count_pages(&empty).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_resolver_delivers_results() {
        let mut resolver = PageCountResolver::new(Arc::new(HeuristicPageCounter));
        resolver.schedule(
            "a".to_string(),
            Upload::new("a.pdf", "application/pdf", fake_pdf(2)),
        );
        resolver.schedule(
            "b".to_string(),
            Upload::new("b.pdf", "application/pdf", fake_pdf(7)),
        );
        assert_eq!(resolver.pending(), 2);

        let mut results = Vec::new();
        while let Some(result) = resolver.next().await {
            results.push(result);
        }
        results.sort_by(|x, y| x.file_id.cmp(&y.file_id));
        assert_eq!(results[0].page_count, 2);
        assert_eq!(results[1].page_count, 7);
        assert_eq!(resolver.pending(), 0);
    }

    #[tokio::test]
    async fn test_failure_resolves_to_one_page() {
        let mut resolver = PageCountResolver::new(Arc::new(BrokenCounter));
        resolver.schedule("x".to_string(), Upload::new("x.pdf", "application/pdf", vec![]));
        let result = resolver.next().await;
        assert_eq!(result.map(|r| r.page_count), Some(1));
    }

    #[tokio::test]
    async fn test_cancelled_task_never_reports() {
        let mut resolver = PageCountResolver::new(Arc::new(SlowCounter));
        resolver.schedule("slow".to_string(), Upload::new("s.pdf", "application/pdf", vec![]));
        assert!(resolver.cancel("slow"));
        assert!(!resolver.cancel("slow"));
        assert_eq!(resolver.pending(), 0);
        assert!(resolver.next().await.is_none());
        assert!(resolver.try_next().is_none());
    }
}
