//! Receiving domain module (event-sourced).
//!
//! Vouchers list the materials a supplier delivered; operators allocate the
//! pending quantity of each line into containers until nothing is pending, then
//! finalize the voucher. Pure domain logic: no IO, no locks, no clock.

pub mod voucher;

pub use voucher::{
    AllocateStock, Allocation, FinalizeVoucher, IntakeLine, ReceivingCommand, ReceivingEvent,
    StockAllocated, VOUCHER_STREAM, Voucher, VoucherFinalized, VoucherIntake, VoucherLine,
};
