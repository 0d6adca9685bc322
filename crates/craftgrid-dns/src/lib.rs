//! craftgrid-dns: keeps each world's host name pointed at its running task.
//!
//! Tasks get a fresh public address every time they start. On a task state
//! change where the task is running, [`DnsUpdater`] looks up the public IP
//! of the task's network interface and upserts an `A` record for the world.

pub mod error;
pub mod event;
pub mod records;
pub mod updater;

pub use error::DnsUpdateError;
pub use event::{Attachment, AttachmentDetail, TaskStateChange};
pub use records::{fqdn, DnsRecord, InterfaceTable, RecordTable};
pub use updater::{DnsFuture, DnsUpdater, InterfaceLookup, RecordSink};
