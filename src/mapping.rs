//! Driver code to label tables.
//!
//! Every table is a static `(code, label)` list searched by [`lookup`]. Codes
//! not in a table, including negative values and codes from newer drivers,
//! map to [`UNKNOWN`].

/// Label returned for any code a table does not know.
pub const UNKNOWN: &str = "UNKNOWN";

/// Temperature sensor codes queried for every device.
pub const TEMPERATURE_SENSORS: [i32; 1] = [0];

/// Clock domain codes queried for every device.
pub const CLOCK_DOMAINS: [i32; 4] = [0, 1, 2, 3];

/// Clock source codes queried for every clock domain.
pub const CLOCK_SOURCES: [i32; 4] = [0, 1, 2, 3];

/// Utilization resource labels, in emission order.
pub const UTILIZATION_GPU: &str = "GPU";
/// See [`UTILIZATION_GPU`].
pub const UTILIZATION_MEMORY: &str = "MEMORY";

type Table = &'static [(i32, &'static str)];

const BUS_TYPES: Table = &[(0, "UNKNOWN"), (1, "PCI"), (2, "PCIE"), (3, "FPCI"), (4, "AGP")];

const TEMPERATURE_SENSOR_NAMES: Table = &[(0, "GPU")];

const CLOCK_DOMAIN_NAMES: Table = &[(0, "GRAPHICS"), (1, "SM"), (2, "MEM"), (3, "VIDEO")];

const CLOCK_SOURCE_NAMES: Table = &[
    (0, "CURRENT"),
    (1, "APP_CLOCK_TARGET"),
    (2, "APP_CLOCK_DEFAULT"),
    (3, "CUSTOMER_BOOST_MAX"),
];

const COMPUTE_MODES: Table =
    &[(0, "DEFAULT"), (1, "EXCLUSIVE_THREAD"), (2, "PROHIBITED"), (3, "EXCLUSIVE_PROCESS")];

const PERFORMANCE_STATES: Table = &[
    (0, "P0"),
    (1, "P1"),
    (2, "P2"),
    (3, "P3"),
    (4, "P4"),
    (5, "P5"),
    (6, "P6"),
    (7, "P7"),
    (8, "P8"),
    (9, "P9"),
    (10, "P10"),
    (11, "P11"),
    (12, "P12"),
    (13, "P13"),
    (14, "P14"),
    (15, "P15"),
];

const PERSISTENCE_MODES: Table = &[(0, "DISABLED"), (1, "ENABLED")];

/// Looks `code` up in `table`, falling back to [`UNKNOWN`].
#[must_use]
pub fn lookup(table: &[(i32, &'static str)], code: i32) -> &'static str {
    table.iter().find(|(known, _)| *known == code).map_or(UNKNOWN, |&(_, label)| label)
}

/// Bus connection category.
#[must_use]
pub fn bus_type(code: i32) -> &'static str {
    lookup(BUS_TYPES, code)
}

/// Temperature sensor slot.
#[must_use]
pub fn temperature_sensor(code: i32) -> &'static str {
    lookup(TEMPERATURE_SENSOR_NAMES, code)
}

/// Clock domain.
#[must_use]
pub fn clock_domain(code: i32) -> &'static str {
    lookup(CLOCK_DOMAIN_NAMES, code)
}

/// Clock source within a domain.
#[must_use]
pub fn clock_source(code: i32) -> &'static str {
    lookup(CLOCK_SOURCE_NAMES, code)
}

/// Compute mode.
#[must_use]
pub fn compute_mode(code: i32) -> &'static str {
    lookup(COMPUTE_MODES, code)
}

/// Performance state. The driver reports 32 when the state is unknown.
#[must_use]
pub fn performance_state(code: i32) -> &'static str {
    lookup(PERFORMANCE_STATES, code)
}

/// Persistence mode flag.
#[must_use]
pub fn persistence_mode(code: i32) -> &'static str {
    lookup(PERSISTENCE_MODES, code)
}

/// Formats the packed CUDA driver version (`1000 * major + 10 * minor`).
///
/// `11070` becomes `"11.7"`.
#[must_use]
pub fn cuda_version_string(raw: i32) -> String {
    format!("{}.{}", raw / 1000, raw % 1000 / 10)
}


// ============================================================================
// Property-based tests with proptest
// ============================================================================
