// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod coordinator;
pub mod ledger;

pub use coordinator::{split_fee, EscrowConfig, EscrowCoordinator};
pub use ledger::{EscrowLedger, EscrowRecord, EscrowStatus, MemoryEscrowLedger};
