//! Live dashboard core for a fleet of launcher machines.
//!
//! A [`CollectionView`] mirrors one remote collection (launchers or Rundeck
//! executions), keeps it current from snapshots, push events and periodic
//! refresh, and hands each derived page to a [`RenderSink`]. Everything runs
//! on one thread inside a `tokio::task::LocalSet`.

pub mod busy;
pub mod collection_view;
pub mod dataflow;
pub mod error;
pub mod error_display;
pub mod event_bus;
pub mod execution_output;
pub mod live_collection;
pub mod polling;
pub mod render;
pub mod selection;
pub mod transport;
pub mod view_pipeline;

#[cfg(test)]
mod testing;

pub use collection_view::{CollectionKind, CollectionSpec, CollectionView, DashboardState, ViewOptions};
pub use error::{DashboardError, TransportError};
pub use error_display::{NotificationVariant, Toast};
pub use event_bus::EventBus;
pub use execution_output::{ExecutionDetail, FollowEnd, OutputCancel, OutputSink, follow_output};
pub use render::{RenderFrame, RenderSink, RowView};
pub use transport::Transport;
pub use view_pipeline::{SortDir, SortKey, ViewState};
