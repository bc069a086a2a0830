//! Human-readable listing of resolved duplicate groups.

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::duplicates::ResolvedGroup;

/// Plain-text formatter.
pub struct TextOutput<'a> {
    groups: &'a [ResolvedGroup],
}

impl<'a> TextOutput<'a> {
    /// Create a new text formatter.
    #[must_use]
    pub fn new(groups: &'a [ResolvedGroup]) -> Self {
        Self { groups }
    }

    /// Write one block per group, then a summary line.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (idx, group) in self.groups.iter().enumerate() {
            writeln!(
                writer,
                "Group {} ({} files, {} each) {}",
                idx + 1,
                group.len(),
                ByteSize(group.size),
                group.fingerprint_hex()
            )?;
            writeln!(writer, "  original   {}", group.original.path.display())?;
            for dup in &group.duplicates {
                writeln!(writer, "  duplicate  {}", dup.path.display())?;
            }
            for kept in &group.protected {
                writeln!(writer, "  protected  {}", kept.path.display())?;
            }
            writeln!(writer)?;
        }
        writeln!(writer, "{}", summary_line(self.groups))
    }
}

/// One-line totals for a set of groups.
#[must_use]
pub fn summary_line(groups: &[ResolvedGroup]) -> String {
    let duplicates: usize = groups.iter().map(|g| g.duplicates.len()).sum();
    let reclaimable: u64 = groups.iter().map(ResolvedGroup::reclaimable).sum();
    format!(
        "{} duplicate group(s), {} removable file(s), {} reclaimable",
        groups.len(),
        duplicates,
        ByteSize(reclaimable)
    )
}
