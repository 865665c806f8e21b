use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// Where operator lines come from. `Ok(None)` ends the session.
#[async_trait]
pub trait InputSource: Send {
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Line-by-line reader over any buffered async source.
pub struct LineInput<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> InputSource for LineInput<R> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}
