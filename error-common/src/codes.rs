// Stable error codes returned in API error bodies.
// Codes never change meaning once published; add new ones instead.

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
    pub const MISSING_REQUIRED_FIELD: &str = "VALIDATION_1002";
    pub const INVALID_FORMAT: &str = "VALIDATION_1003";
}

pub mod lookup {
    pub const NO_ACTIVE_CONTRACT: &str = "NOT_FOUND_2001";
    pub const ENTRY_NOT_FOUND: &str = "NOT_FOUND_2002";
    pub const TRANSACTION_NOT_FOUND: &str = "NOT_FOUND_2003";
    pub const CONTRACT_CONFLICT: &str = "CONFLICT_2101";
}

pub mod allocation {
    pub const SUM_MISMATCH: &str = "ALLOC_3001";
}

pub mod persistence {
    pub const TRANSIENT: &str = "DB_4001";
    pub const CONSTRAINT_VIOLATION: &str = "DB_4002";
    pub const QUERY_FAILED: &str = "DB_4003";
}

pub mod internal {
    pub const UNEXPECTED: &str = "INTERNAL_5001";
}
