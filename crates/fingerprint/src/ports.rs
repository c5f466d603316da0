//! Port-number heuristics
//!
//! Pure lookups, no handshake. Used for the database probe's detail line
//! and for port-service fingerprints.

/// Well-known database ports, in probe order.
pub const DATABASE_PORTS: [u16; 6] = [1433, 1521, 3306, 5432, 6379, 27017];

/// Short vendor label for a database port.
pub fn database_vendor(port: u16) -> &'static str {
    match port {
        1433 => "SQL Server",
        1521 => "Oracle",
        3306 => "MySQL",
        5432 => "PostgreSQL",
        6379 => "Redis",
        27017 => "MongoDB",
        _ => "Unknown",
    }
}

/// Product name used for port-service fingerprints.
pub fn database_product(port: u16) -> Option<&'static str> {
    let product = match port {
        1433 => "Microsoft SQL Server",
        1521 => "Oracle Database",
        3306 => "MySQL",
        5432 => "PostgreSQL",
        6379 => "Redis",
        27017 => "MongoDB",
        _ => return None,
    };
    Some(product)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_table() {
        assert_eq!(database_vendor(1433), "SQL Server");
        assert_eq!(database_vendor(27017), "MongoDB");
        assert_eq!(database_vendor(9999), "Unknown");
    }

    #[test]
    fn every_database_port_has_a_product() {
        for port in DATABASE_PORTS {
            assert!(database_product(port).is_some(), "port {port}");
            assert_ne!(database_vendor(port), "Unknown");
        }
        assert_eq!(database_product(8080), None);
    }
}
