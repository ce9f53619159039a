//! # Schema Mutations
//!
//! Field add, delete, reorder and alter. Each operation edits the
//! descriptor block and, when records already exist, rewrites the whole
//! data region record by record.
//!
//! The scan direction is a correctness requirement, not a preference.
//! When records grow (field added, width increased) the file is rewritten
//! from the last record to the first so a record is never overwritten
//! before it is read. When records shrink or stay the same size the scan
//! runs first to last. There is no journal; a rewrite that fails midway
//! leaves the data region in whatever state the scan reached.

use tracing::debug;

use crate::dbf::store::{DbfStore, MAX_HEADER_LENGTH};
use crate::dbf::{is_value_null, null_fill, FieldDescr, FieldType};
use crate::error::{Error, Result};
use crate::vfs::Access;
use crate::wire::{DbfFieldDescriptor, DBF_BLOCK_SIZE};
use std::io::SeekFrom;
use zerocopy::IntoBytes;

impl DbfStore {
    /// Appends a field of a logical type, returning its index.
    pub fn add_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        width: usize,
        decimals: u8,
    ) -> Result<usize> {
        let tag = field_type.native_tag().ok_or_else(|| {
            Error::schema(format!("cannot create a field of type {field_type:?}"))
        })?;
        let decimals = match field_type {
            FieldType::Integer | FieldType::String | FieldType::Logical | FieldType::Date => 0,
            _ => decimals,
        };
        self.add_native_field(name, tag, width, decimals)
    }

    /// Appends a field with an explicit native type tag.
    ///
    /// On a table that already holds records, every record is rewritten
    /// from last to first, the new field filled with its type's NULL
    /// convention, and the header is rewritten afterwards.
    pub fn add_native_field(
        &mut self,
        name: &str,
        tag: u8,
        width: usize,
        decimals: u8,
    ) -> Result<usize> {
        if self.access != Access::Update {
            return Err(Error::usage("store is open read-only"));
        }
        let width = Self::clamp_width(name, width)?;
        if self.header_length + DBF_BLOCK_SIZE > MAX_HEADER_LENGTH {
            return Err(Error::schema(format!(
                "adding a field would push the header past {MAX_HEADER_LENGTH} bytes"
            )));
        }
        if self.record_length + width > MAX_HEADER_LENGTH {
            return Err(Error::schema(format!(
                "adding a field would push records past {MAX_HEADER_LENGTH} bytes"
            )));
        }

        self.flush_record()?;
        self.current_record = None;

        let old_header_length = self.header_length;
        let old_record_length = self.record_length;
        let index = self.fields.len();

        let descr = DbfFieldDescriptor::new(name, tag, width as u8, decimals);
        self.raw_header
            .splice(index * DBF_BLOCK_SIZE..index * DBF_BLOCK_SIZE, descr.as_bytes().iter().copied());
        self.fields.push(FieldDescr {
            name: name.chars().take(10).collect(),
            tag,
            width,
            decimals,
            offset: old_record_length,
        });
        self.header_length += DBF_BLOCK_SIZE;
        self.record_length += width;
        self.rebuild_name_index();

        if self.record_count > 0 {
            debug!(
                name,
                records = self.record_count,
                "rewriting data region for added field"
            );
            let mut record = vec![0u8; self.record_length];
            let fill = null_fill(tag);
            for i in (0..self.record_count).rev() {
                self.read_raw(
                    (old_header_length + i * old_record_length) as u64,
                    &mut record[..old_record_length],
                )?;
                record[old_record_length..].fill(fill);
                self.write_raw(self.record_offset(i), &record)?;
            }
            self.rewrite_eof_marker()?;
        }

        self.write_header()?;
        Ok(index)
    }

    /// Removes a field, shifting the ones after it down.
    pub fn delete_field(&mut self, field: usize) -> Result<()> {
        if self.access != Access::Update {
            return Err(Error::usage("store is open read-only"));
        }
        if field >= self.fields.len() {
            return Err(Error::usage(format!(
                "field index {field} out of range 0..{}",
                self.fields.len()
            )));
        }

        self.flush_record()?;
        self.current_record = None;

        let old_header_length = self.header_length;
        let old_record_length = self.record_length;
        let removed = self.fields.remove(field);
        self.raw_header
            .drain(field * DBF_BLOCK_SIZE..(field + 1) * DBF_BLOCK_SIZE);
        self.header_length -= DBF_BLOCK_SIZE;
        // shift survivors by the removed width; the record length carries
        // any trailing padding, so it shrinks by the same delta instead of
        // being recomputed from the width sum
        for f in self.fields.iter_mut().skip(field) {
            f.offset -= removed.width;
        }
        self.record_length -= removed.width;
        self.rebuild_name_index();

        if self.record_count > 0 {
            let mut old_record = vec![0u8; old_record_length];
            let mut record = vec![0u8; self.record_length];
            for i in 0..self.record_count {
                self.read_raw(
                    (old_header_length + i * old_record_length) as u64,
                    &mut old_record,
                )?;
                record[..removed.offset].copy_from_slice(&old_record[..removed.offset]);
                record[removed.offset..]
                    .copy_from_slice(&old_record[removed.offset + removed.width..]);
                self.write_raw(self.record_offset(i), &record)?;
            }
            self.rewrite_eof_marker()?;
        }

        self.write_header()
    }

    /// Rearranges fields according to `order`, where `order[j]` names the
    /// old index that becomes field `j`. The permutation must be complete.
    /// A read failure during the rewrite aborts without committing the
    /// new field table.
    pub fn reorder_fields(&mut self, order: &[usize]) -> Result<()> {
        if self.access != Access::Update {
            return Err(Error::usage("store is open read-only"));
        }
        if order.len() != self.fields.len() {
            return Err(Error::schema(format!(
                "permutation of {} entries over {} fields",
                order.len(),
                self.fields.len()
            )));
        }
        let mut seen = vec![false; order.len()];
        for &old in order {
            if old >= order.len() || seen[old] {
                return Err(Error::schema("order is not a permutation".to_string()));
            }
            seen[old] = true;
        }

        self.flush_record()?;
        self.current_record = None;

        let mut new_fields = Vec::with_capacity(order.len());
        let mut new_raw = Vec::with_capacity(self.raw_header.len());
        let mut offset = 1;
        for &old in order {
            let mut f = self.fields[old].clone();
            f.offset = offset;
            offset += f.width;
            new_fields.push(f);
            new_raw.extend_from_slice(
                &self.raw_header[old * DBF_BLOCK_SIZE..(old + 1) * DBF_BLOCK_SIZE],
            );
        }
        new_raw.extend_from_slice(&self.raw_header[order.len() * DBF_BLOCK_SIZE..]);

        let mut old_record = vec![0u8; self.record_length];
        let mut record = vec![0u8; self.record_length];
        for i in 0..self.record_count {
            self.read_raw(self.record_offset(i), &mut old_record)?;
            // deletion flag and trailing padding carry over untouched
            record.copy_from_slice(&old_record);
            for (j, &old) in order.iter().enumerate() {
                let src = &self.fields[old];
                let dst = &new_fields[j];
                record[dst.offset..dst.offset + dst.width]
                    .copy_from_slice(&old_record[src.offset..src.offset + src.width]);
            }
            self.write_raw(self.record_offset(i), &record)?;
        }

        self.fields = new_fields;
        self.raw_header = new_raw;
        self.rebuild_name_index();
        self.write_header()
    }

    /// Changes one field's native type, width or decimal count.
    ///
    /// Shrinking or changing type rewrites top to bottom; growing rewrites
    /// bottom to top. Values NULL under the old type become NULL under the
    /// new type's fill character. Numeric values losing width shed their
    /// leading padding before anything else is cut.
    pub fn alter_field(
        &mut self,
        field: usize,
        tag: u8,
        width: usize,
        decimals: u8,
    ) -> Result<()> {
        if self.access != Access::Update {
            return Err(Error::usage("store is open read-only"));
        }
        if field >= self.fields.len() {
            return Err(Error::usage(format!(
                "field index {field} out of range 0..{}",
                self.fields.len()
            )));
        }
        let width = Self::clamp_width(&self.fields[field].name.clone(), width)?;
        if self.record_length - self.fields[field].width + width > MAX_HEADER_LENGTH {
            return Err(Error::schema(format!(
                "altered field would push records past {MAX_HEADER_LENGTH} bytes"
            )));
        }

        self.flush_record()?;
        self.current_record = None;

        let old = self.fields[field].clone();
        let chunk = &mut self.raw_header[field * DBF_BLOCK_SIZE..(field + 1) * DBF_BLOCK_SIZE];
        chunk[11] = tag;
        chunk[16] = width as u8;
        chunk[17] = decimals;

        self.fields[field].tag = tag;
        self.fields[field].width = width;
        self.fields[field].decimals = decimals;
        let old_record_length = self.record_length;
        if width >= old.width {
            let delta = width - old.width;
            self.record_length += delta;
            for f in self.fields.iter_mut().skip(field + 1) {
                f.offset += delta;
            }
        } else {
            let delta = old.width - width;
            self.record_length -= delta;
            for f in self.fields.iter_mut().skip(field + 1) {
                f.offset -= delta;
            }
        }

        if self.record_count > 0 && (width != old.width || tag != old.tag) {
            let rewrite = |store: &mut DbfStore, i: usize| -> Result<()> {
                let mut old_record = vec![0u8; old_record_length];
                store.read_raw(
                    (store.header_length + i * old_record_length) as u64,
                    &mut old_record,
                )?;
                let mut record = Vec::with_capacity(store.record_length);
                record.extend_from_slice(&old_record[..old.offset]);
                convert_slot(
                    &mut record,
                    &old_record[old.offset..old.offset + old.width],
                    &old,
                    tag,
                    width,
                );
                record.extend_from_slice(&old_record[old.offset + old.width..]);
                store.write_raw(store.record_offset(i), &record)
            };
            if width <= old.width {
                for i in 0..self.record_count {
                    rewrite(self, i)?;
                }
            } else {
                for i in (0..self.record_count).rev() {
                    rewrite(self, i)?;
                }
            }
            self.rewrite_eof_marker()?;
        }

        self.write_header()
    }

    fn read_raw(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        if self.file.read_fully(buf)? != buf.len() {
            return Err(Error::corrupt(offset, "record truncated during rewrite"));
        }
        self.requires_seek = true;
        Ok(())
    }

    fn write_raw(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write(buf)?;
        self.requires_seek = true;
        Ok(())
    }
}

/// Reformats one field value into a new width and type tag, appending the
/// result to `out`.
fn convert_slot(out: &mut Vec<u8>, old_slice: &[u8], old: &FieldDescr, tag: u8, width: usize) {
    if is_value_null(old.tag, old_slice) {
        out.extend(std::iter::repeat(null_fill(tag)).take(width));
        return;
    }
    let numeric = matches!(old.tag, b'N' | b'F');
    let trimmed: &[u8] = if numeric {
        let lead = old_slice.iter().take_while(|&&b| b == b' ').count();
        &old_slice[lead..]
    } else {
        old_slice
    };
    if trimmed.len() >= width {
        out.extend_from_slice(&trimmed[..width]);
    } else if numeric {
        out.extend(std::iter::repeat(b' ').take(width - trimmed.len()));
        out.extend_from_slice(trimmed);
    } else {
        out.extend_from_slice(trimmed);
        out.extend(std::iter::repeat(b' ').take(width - trimmed.len()));
    }
}
