//! Collection names and the file keys they persist under.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Notices,
    Reports,
    ReportUpdates,
    Appointments,
    Availability,
    Board,
    Bulletin,
    Documents,
    Messages,
    Notifications,
    Posts,
}

impl Collection {
    /// File stem under the data directory.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Notices => "notices",
            Collection::Reports => "reports",
            Collection::ReportUpdates => "report-updates",
            Collection::Appointments => "appointments",
            Collection::Availability => "availability",
            Collection::Board => "board",
            Collection::Bulletin => "bulletin",
            Collection::Documents => "documents",
            Collection::Messages => "messages",
            Collection::Notifications => "notifications",
            Collection::Posts => "posts",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.key())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
