/// Counters from a resolution run. Logged for observability; not part of
/// the data contract.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub total_mentions: u32,
    pub processed: u32,
    pub valid_records: u32,
    pub quarantined: u32,
    pub duplicate_identifiers: u32,
    pub invalid_identifiers: u32,
    pub lookup_failures: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Resolution Run Complete ===")?;
        writeln!(f, "Mentions:           {}", self.total_mentions)?;
        writeln!(f, "Processed:          {}", self.processed)?;
        writeln!(f, "Accepted:           {}", self.valid_records)?;
        writeln!(f, "Quarantined:        {}", self.quarantined)?;
        writeln!(f, "Duplicates:         {}", self.duplicate_identifiers)?;
        writeln!(f, "Invalid identifiers:{}", self.invalid_identifiers)?;
        writeln!(f, "Lookup failures:    {}", self.lookup_failures)?;
        Ok(())
    }
}
