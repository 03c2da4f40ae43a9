mod responses;

pub use responses::{
    DayAvailability, DeleteResponse, HealthResponse, LoginResponse, MarkReadResponse, Pagination,
    UserPage,
};
