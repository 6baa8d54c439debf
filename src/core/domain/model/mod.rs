pub mod connection;
pub mod delta;
pub mod device;
pub mod event;
pub mod inventory_object;
pub mod lifecycle;
pub mod operation;
pub mod outcome;
pub mod report;
pub mod selection;
pub mod snapshot;
pub mod tag;
pub mod task;
