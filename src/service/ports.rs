use crate::Result;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of replacement host ports after a conflict
pub trait PortAllocator: Send + Sync {
    fn allocate(&self) -> Result<u16>;
}

/// Asks the OS for a currently unbound port.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralPorts;

impl PortAllocator for EphemeralPorts {
    fn allocate(&self) -> Result<u16> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        Ok(listener.local_addr()?.port())
    }
}

/// Hands out ports from a fixed range in order, wrapping at the end.
#[derive(Debug)]
pub struct PortRange {
    start: u16,
    len: u32,
    next: AtomicU32,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        assert!(end >= start, "empty port range {}..={}", start, end);
        Self {
            start,
            len: u32::from(end - start) + 1,
            next: AtomicU32::new(0),
        }
    }
}

impl PortAllocator for PortRange {
    fn allocate(&self) -> Result<u16> {
        let offset = self.next.fetch_add(1, Ordering::Relaxed) % self.len;
        Ok(self.start + offset as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_port_is_nonzero() {
        assert_ne!(EphemeralPorts.allocate().unwrap(), 0);
    }

    #[test]
    fn test_range_wraps() {
        let range = PortRange::new(40000, 40001);
        let ports: Vec<u16> = (0..3).map(|_| range.allocate().unwrap()).collect();
        assert_eq!(ports, vec![40000, 40001, 40000]);
    }
}
