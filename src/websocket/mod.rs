pub mod pending_reports;
