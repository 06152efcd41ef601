//! Debug-info patcher (spec.md §4.10): rewrites the absolute
//! `<temp-root>`-prefixed paths DWARF leaves behind in `.debug_info`/
//! `.debug_str` back to `/`, in place and at equal length so no other
//! DWARF offset in the section has to move.
//!
//! Parses just enough of the ELF header and section table to locate
//! those two sections; anything else about the object is left alone.
//! A file missing either section, or whose object isn't little-endian
//! (the only encoding this patcher understands), is passed through
//! unchanged.

use tracing::warn;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const SHN_XINDEX: u16 = 0xffff;
const SHT_NULL: u32 = 0;

struct Section {
    name_offset: u32,
    offset: u64,
    size: u64,
}

/// Patches `.debug_info` and `.debug_str` in `object` in place.
/// Returns `true` if anything was rewritten.
pub fn patch_debug_info(object: &mut [u8], temp_root: &[u8]) -> bool {
    if temp_root.is_empty() {
        return false;
    }
    let Some(sections) = parse_sections(object) else {
        return false;
    };

    let mut patched = false;
    for name in [".debug_info", ".debug_str"] {
        if let Some(section) = sections.iter().find(|s| s.name_offset != 0 && section_name_matches(object, &sections, s, name)) {
            let start = section.offset as usize;
            let end = start.saturating_add(section.size as usize).min(object.len());
            if start < end {
                patched |= patch_region(&mut object[start..end], temp_root);
            }
        }
    }
    patched
}

fn section_name_matches(object: &[u8], sections: &[Section], target: &Section, want: &str) -> bool {
    let Some(strtab) = sections.last() else { return false };
    let name_off = strtab.offset as usize + target.name_offset as usize;
    read_cstr(object, name_off).is_some_and(|s| s == want)
}

fn read_cstr(data: &[u8], start: usize) -> Option<&str> {
    let slice = data.get(start..)?;
    let end = memchr::memchr(0, slice)?;
    std::str::from_utf8(&slice[..end]).ok()
}

/// Replaces every non-overlapping occurrence of `temp_root` within
/// `region` with `/` followed by enough trailing `/` to keep the same
/// byte length, preserving every other offset into the section.
fn patch_region(region: &mut [u8], temp_root: &[u8]) -> bool {
    let matches: Vec<usize> = memchr::memmem::find_iter(region, temp_root).collect();
    for start in &matches {
        let end = start + temp_root.len();
        region[*start] = b'/';
        for b in &mut region[start + 1..end] {
            *b = b'/';
        }
    }
    !matches.is_empty()
}

fn parse_sections(object: &[u8]) -> Option<Vec<Section>> {
    if object.len() < 20 || &object[..4] != b"\x7fELF" {
        return None;
    }
    let is_64 = match object[EI_CLASS] {
        ELFCLASS32 => false,
        ELFCLASS64 => true,
        _ => return None,
    };
    if object[EI_DATA] != ELFDATA2LSB {
        warn!("debug-info patcher: non-little-endian object, skipping");
        return None;
    }

    let (e_shoff, e_shentsize, mut e_shnum, mut e_shstrndx) = if is_64 {
        (
            u64::from_le_bytes(object.get(40..48)?.try_into().ok()?),
            u16::from_le_bytes(object.get(58..60)?.try_into().ok()?),
            u16::from_le_bytes(object.get(60..62)?.try_into().ok()?),
            u16::from_le_bytes(object.get(62..64)?.try_into().ok()?),
        )
    } else {
        (
            u64::from(u32::from_le_bytes(object.get(32..36)?.try_into().ok()?)),
            u16::from_le_bytes(object.get(46..48)?.try_into().ok()?),
            u16::from_le_bytes(object.get(48..50)?.try_into().ok()?),
            u16::from_le_bytes(object.get(50..52)?.try_into().ok()?),
        )
    };

    let entry_size = e_shentsize as usize;
    if entry_size == 0 {
        return None;
    }

    let read_section = |idx: usize| -> Option<Section> {
        let base = e_shoff as usize + idx * entry_size;
        let hdr = object.get(base..base + entry_size)?;
        if is_64 {
            Some(Section {
                name_offset: u32::from_le_bytes(hdr.get(0..4)?.try_into().ok()?),
                offset: u64::from_le_bytes(hdr.get(24..32)?.try_into().ok()?),
                size: u64::from_le_bytes(hdr.get(32..40)?.try_into().ok()?),
            })
        } else {
            Some(Section {
                name_offset: u32::from_le_bytes(hdr.get(0..4)?.try_into().ok()?),
                offset: u64::from(u32::from_le_bytes(hdr.get(16..20)?.try_into().ok()?)),
                size: u64::from(u32::from_le_bytes(hdr.get(20..24)?.try_into().ok()?)),
            })
        }
    };

    // SHN_XINDEX: the true section count/strndx live in section[0] when
    // they don't fit the 16-bit header fields.
    if e_shnum == 0 || e_shstrndx == SHN_XINDEX {
        let section0 = read_section(0)?;
        if e_shnum == 0 {
            e_shnum = u16::try_from(section0.size.min(u64::from(u16::MAX))).ok()?;
        }
        if e_shstrndx == SHN_XINDEX {
            e_shstrndx = 0; // recorded in sh_link, not modeled here; rare in practice.
        }
    }

    let mut sections = Vec::with_capacity(e_shnum as usize);
    for idx in 0..e_shnum as usize {
        let section = read_section(idx)?;
        if idx != 0 || section.offset != 0 || section.size != 0 {
            sections.push(section);
        }
    }
    if sections.is_empty() {
        return None;
    }
    // The string table section is appended as `.last()` by convention
    // of `section_name_matches`'s lookup above; reorder so it's there.
    let strndx = e_shstrndx as usize;
    if strndx < sections.len() {
        let strtab = read_section(strndx)?;
        if strtab.size != SHT_NULL as u64 {
            sections.push(strtab);
        }
    }
    Some(sections)
}
