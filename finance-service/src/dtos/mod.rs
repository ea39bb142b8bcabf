pub mod reports;
pub mod transactions;

pub use reports::{
    GenerateReportParams, ReportListParams, ReportListResponse, ReportResponse,
    ReportSettingResponse, UpdateReportSettingRequest,
};
pub use transactions::{
    BulkDeleteRequest, BulkDeleteResponse, BulkInsertRequest, BulkInsertResponse,
    TransactionResponse,
};
