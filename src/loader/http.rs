//! HTTP loader on `reqwest` + `tokio`.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use vodstream_common::LoaderId;
use vodstream_media::{ChannelHandle, ChannelTag};

use super::{Loader, LoaderFactory};
use crate::config::HttpConfig;
use crate::events::{LoaderSignal, Signal};

/// Builds [`HttpLoader`]s sharing one client and one signal sender.
#[derive(Clone)]
pub struct HttpLoaderFactory {
    client: reqwest::Client,
    signals: mpsc::UnboundedSender<Signal>,
    runtime: tokio::runtime::Handle,
}

impl HttpLoaderFactory {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &HttpConfig, signals: mpsc::UnboundedSender<Signal>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            signals,
            runtime: tokio::runtime::Handle::try_current()?,
        })
    }
}

impl LoaderFactory for HttpLoaderFactory {
    fn create(&mut self, tag: ChannelTag, channel: ChannelHandle) -> Box<dyn Loader> {
        Box::new(HttpLoader {
            id: LoaderId::new(),
            tag,
            channel,
            client: self.client.clone(),
            signals: self.signals.clone(),
            runtime: self.runtime.clone(),
            task: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            loading: false,
            url: None,
        })
    }
}

/// One-fetch-at-a-time HTTP loader.
pub struct HttpLoader {
    id: LoaderId,
    tag: ChannelTag,
    channel: ChannelHandle,
    client: reqwest::Client,
    signals: mpsc::UnboundedSender<Signal>,
    runtime: tokio::runtime::Handle,
    task: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    loading: bool,
    url: Option<String>,
}

impl Loader for HttpLoader {
    fn id(&self) -> LoaderId {
        self.id
    }

    fn start(&mut self, url: &str) {
        if self.cancelled.load(Ordering::Acquire) {
            tracing::debug!(loader = %self.id, url, "Ignoring start on destroyed loader");
            return;
        }

        if let Some(previous) = self.task.take() {
            previous.abort();
        }
        tracing::debug!(loader = %self.id, tag = %self.tag, url, "Fetch started");
        self.loading = true;
        self.url = Some(url.to_string());

        let id = self.id;
        let tag = self.tag;
        let url = url.to_string();
        let client = self.client.clone();
        let channel = self.channel.clone();
        let signals = self.signals.clone();
        let cancelled = self.cancelled.clone();

        self.task = Some(self.runtime.spawn(async move {
            let signal = match fetch(&client, &url).await {
                Ok(body) => {
                    let mut ch = channel.lock();
                    if cancelled.load(Ordering::Acquire) {
                        return;
                    }
                    ch.append(body);
                    LoaderSignal::Complete {
                        loader: id,
                        tag,
                        url,
                    }
                }
                Err(e) => {
                    if cancelled.load(Ordering::Acquire) {
                        return;
                    }
                    LoaderSignal::Error {
                        loader: id,
                        tag,
                        url,
                        message: e.to_string(),
                    }
                }
            };
            // Receiver gone means the session is shutting down.
            let _ = signals.send(Signal::Loader(signal));
        }));
    }

    fn destroy(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.loading = false;
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn finish(&mut self) {
        self.loading = false;
        self.task = None;
    }
}

impl Drop for HttpLoader {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> reqwest::Result<Bytes> {
    client.get(url).send().await?.error_for_status()?.bytes().await
}
