//! Fetch abstraction.
//!
//! A [`Loader`] owns at most one outstanding fetch. It appends the fetched
//! bytes to the channel it was created for and reports the outcome as a
//! [`LoaderSignal`](crate::events::LoaderSignal) carrying its [`LoaderId`].

mod http;

pub use http::{HttpLoader, HttpLoaderFactory};

use vodstream_common::LoaderId;
use vodstream_media::{ChannelHandle, ChannelTag};

pub trait Loader: Send {
    /// Identity of this instance. A replacement loader gets a new one.
    fn id(&self) -> LoaderId;

    /// Begin fetching `url`.
    fn start(&mut self, url: &str);

    /// Abandon any in-flight fetch. Its eventual result is dropped.
    fn destroy(&mut self);

    /// Whether a fetch is outstanding.
    fn is_loading(&self) -> bool;

    /// URL of the current or last fetch.
    fn url(&self) -> Option<&str>;

    /// Clear the loading state once the result has been consumed.
    fn finish(&mut self);
}

/// Creates loaders bound to a channel.
pub trait LoaderFactory: Send {
    fn create(&mut self, tag: ChannelTag, channel: ChannelHandle) -> Box<dyn Loader>;
}
