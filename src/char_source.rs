use crate::error::{BufferError, Result};
use crate::gap_buffer::GapBuffer;
use crate::range::Range;

/// Bulk-copy capability bridging a foreign sequence into the core.
///
/// `replace` never pattern-matches on the concrete type of its source; it only
/// knows it can ask a `CharSource` to write a subrange of itself into a
/// destination slice, rather than type-casing over every possible source
/// representation.
pub trait CharSource {
    /// Number of code units available from this source.
    fn source_len(&self) -> usize;

    /// Writes `subrange` of this source into `dest[dest_begin..dest_begin + subrange.len()]`.
    fn write_into(&self, subrange: Range, dest: &mut [char], dest_begin: usize) -> Result<()>;
}

fn validate_dest(dest: &[char], dest_begin: usize, required: usize) -> Result<()> {
    let fits = match dest_begin.checked_add(required) {
        Some(end) => end <= dest.len(),
        None => false,
    };
    if !fits {
        return Err(BufferError::InvalidDestination {
            dest_len: dest.len(),
            dest_begin,
            required,
        });
    }
    Ok(())
}

impl CharSource for char {
    fn source_len(&self) -> usize {
        1
    }

    fn write_into(&self, subrange: Range, dest: &mut [char], dest_begin: usize) -> Result<()> {
        subrange.validate(1)?;
        if subrange.is_empty() {
            return Ok(());
        }
        validate_dest(dest, dest_begin, 1)?;
        dest[dest_begin] = *self;
        Ok(())
    }
}

impl CharSource for [char] {
    fn source_len(&self) -> usize {
        self.len()
    }

    fn write_into(&self, subrange: Range, dest: &mut [char], dest_begin: usize) -> Result<()> {
        subrange.validate(self.len())?;
        let len = subrange.len();
        validate_dest(dest, dest_begin, len)?;
        dest[dest_begin..dest_begin + len].copy_from_slice(&self[subrange.start..subrange.end]);
        Ok(())
    }
}

impl CharSource for Vec<char> {
    fn source_len(&self) -> usize {
        self.as_slice().source_len()
    }

    fn write_into(&self, subrange: Range, dest: &mut [char], dest_begin: usize) -> Result<()> {
        self.as_slice().write_into(subrange, dest, dest_begin)
    }
}

/// Convenience provider: expands a `&str` into its `char` sequence so callers
/// don't have to pre-collect one. `subrange` indexes by *char* position,
/// matching the flat code-unit indexing the rest of the crate uses (it is not
/// a byte offset).
impl CharSource for str {
    fn source_len(&self) -> usize {
        self.chars().count()
    }

    fn write_into(&self, subrange: Range, dest: &mut [char], dest_begin: usize) -> Result<()> {
        let len = subrange.len();
        validate_dest(dest, dest_begin, len)?;
        for (i, ch) in self.chars().skip(subrange.start).take(len).enumerate() {
            dest[dest_begin + i] = ch;
        }
        Ok(())
    }
}

impl CharSource for GapBuffer {
    fn source_len(&self) -> usize {
        self.length()
    }

    fn write_into(&self, subrange: Range, dest: &mut [char], dest_begin: usize) -> Result<()> {
        self.get_chars(subrange.start, subrange.end, dest, dest_begin)
    }
}
