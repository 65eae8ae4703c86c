//! `amo-registry`: company registration, desktop-application review and the
//! platform activity trail.

pub mod activity;
pub mod application;
pub mod company;

pub use activity::{Activity, ActivityType};
pub use application::{
    ApplicationAction, ApplicationCommand, ApplicationEvent, ApplicationStatus, DesktopApplication,
};
pub use company::{Company, CompanyDetails, TinNumber};
