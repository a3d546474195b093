pub use rollbook_models::fees::{
    CreateFeeDto, Fee, FeePayment, StudentFee, StudentFeeStatus,
};
pub use rollbook_models::ids::{FeeId, FeePaymentId, StudentFeeId};
