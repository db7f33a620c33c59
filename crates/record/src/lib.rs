//! Record Manager: slotted-page tuple storage over a buffer pool, plus the
//! schema-driven fixed-width encoding used to turn typed attribute values
//! into record bytes and back.
//!
//! A table occupies one page file. Page 0 is a header page holding the
//! schema and bookkeeping counters; every page after it is a data page of
//! fixed-stride slots, each holding exactly one record body.


use buffer::BufferPool;
use common::{DbError, DbResult, PageId, RecordId, ReplacementStrategy};
use storage::{PAGE_SIZE, PageFile};
use types::{DataType, Value};

const PAGE_HEADER_SIZE: usize = 45;
const NONE_PAGE: i64 = -1;
const MAX_ATTR_NAME_LEN: usize = 15;
const TABLE_HEADER_ATTR_SIZE: usize = MAX_ATTR_NAME_LEN + 1 + 2;

/// One column in a table's schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    /// On-disk width for `Str` attributes; ignored for the other types,
    /// whose widths are fixed (`Int`/`Float` = 4 bytes, `Bool` = 1 byte).
    pub type_length: u16,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType, type_length: u16) -> Self {
        Self {
            name: name.into(),
            data_type,
            type_length,
        }
    }

    /// Width in bytes this attribute occupies in a record body.
    pub fn width(&self) -> usize {
        match self.data_type {
            DataType::Int => 4,
            DataType::Float => 4,
            DataType::Bool => 1,
            DataType::Str => self.type_length as usize,
        }
    }
}

/// The typed layout of a table's records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    pub attributes: Vec<Attribute>,
    pub key_indices: Vec<usize>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>, key_indices: Vec<usize>) -> DbResult<Self> {
        for attr in &attributes {
            if attr.name.len() > MAX_ATTR_NAME_LEN {
                return Err(DbError::InvalidHeader(format!(
                    "attribute name '{}' exceeds {MAX_ATTR_NAME_LEN} bytes",
                    attr.name
                )));
            }
        }
        for &idx in &key_indices {
            if idx >= attributes.len() {
                return Err(DbError::InvalidHeader(format!(
                    "key index {idx} is out of range for {} attributes",
                    attributes.len()
                )));
            }
        }
        Ok(Self {
            attributes,
            key_indices,
        })
    }

    /// Total record size: the sum of attribute widths, rounded up to the
    /// next multiple of 4.
    pub fn record_size(&self) -> usize {
        let raw: usize = self.attributes.iter().map(|a| a.width()).sum();
        raw.div_ceil(4) * 4
    }

    /// Byte offset of attribute `idx` within a record body.
    pub fn attr_offset(&self, idx: usize) -> usize {
        self.attributes[..idx].iter().map(|a| a.width()).sum()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }
}

/// A single tuple: a stable locator plus its fixed-width body bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub data: Vec<u8>,
}

impl Record {
    /// A zeroed record of the right size for `schema`, with a placeholder
    /// id to be filled in by `insert_record`.
    pub fn new(schema: &Schema) -> Self {
        Self {
            id: RecordId {
                page_id: PageId(0),
                slot: 0,
            },
            data: vec![0u8; schema.record_size()],
        }
    }

    pub fn set_attr(&mut self, schema: &Schema, idx: usize, value: &Value) -> DbResult<()> {
        let attr = schema
            .attributes
            .get(idx)
            .ok_or_else(|| DbError::GeneralError(format!("no attribute at index {idx}")))?;
        if attr.data_type != value.data_type() {
            return Err(DbError::GeneralError(format!(
                "attribute {} is {:?}, got {:?}",
                attr.name,
                attr.data_type,
                value.data_type()
            )));
        }
        let offset = schema.attr_offset(idx);
        let width = attr.width();
        match value {
            Value::Int(v) => self.data[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
            Value::Float(v) => self.data[offset..offset + 4].copy_from_slice(&v.to_le_bytes()),
            Value::Bool(v) => self.data[offset] = u8::from(*v),
            Value::Str(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > width {
                    return Err(DbError::GeneralError(format!(
                        "string value for {} exceeds declared width {width}",
                        attr.name
                    )));
                }
                self.data[offset..offset + width].fill(0);
                self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
        }
        Ok(())
    }

    pub fn get_attr(&self, schema: &Schema, idx: usize) -> DbResult<Value> {
        let attr = schema
            .attributes
            .get(idx)
            .ok_or_else(|| DbError::GeneralError(format!("no attribute at index {idx}")))?;
        let offset = schema.attr_offset(idx);
        let width = attr.width();
        Ok(match attr.data_type {
            DataType::Int => Value::Int(i32::from_le_bytes(
                self.data[offset..offset + 4].try_into().unwrap(),
            )),
            DataType::Float => Value::Float(f32::from_le_bytes(
                self.data[offset..offset + 4].try_into().unwrap(),
            )),
            DataType::Bool => Value::Bool(self.data[offset] != 0),
            DataType::Str => {
                let raw = &self.data[offset..offset + width];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
                Value::Str(String::from_utf8_lossy(&raw[..end]).into_owned())
            }
        })
    }
}

/// An opaque boundary between the record layer and predicate evaluation.
/// Implemented externally by whatever expression representation a caller
/// chooses to evaluate filters with during a scan.
pub trait Predicate {
    fn eval(&self, record: &Record, schema: &Schema) -> DbResult<bool>;
}

#[derive(Clone, Copy, Debug)]
struct PageHeader {
    page_identifier: u8,
    total_tuples: u32,
    free_slot_count: u32,
    next_free_slot_index: u32,
    prev_free_page_index: i64,
    next_free_page_index: i64,
    prev_data_page_index: i64,
    next_data_page_index: i64,
}

impl PageHeader {
    fn uninitialized() -> Self {
        Self {
            page_identifier: 0,
            total_tuples: 0,
            free_slot_count: 0,
            next_free_slot_index: 0,
            prev_free_page_index: NONE_PAGE,
            next_free_page_index: NONE_PAGE,
            prev_data_page_index: NONE_PAGE,
            next_data_page_index: NONE_PAGE,
        }
    }

    fn read_from(buf: &[u8]) -> Self {
        Self {
            page_identifier: buf[0],
            total_tuples: u32::from_le_bytes(buf[1..5].try_into().unwrap()),
            free_slot_count: u32::from_le_bytes(buf[5..9].try_into().unwrap()),
            next_free_slot_index: u32::from_le_bytes(buf[9..13].try_into().unwrap()),
            prev_free_page_index: i64::from_le_bytes(buf[13..21].try_into().unwrap()),
            next_free_page_index: i64::from_le_bytes(buf[21..29].try_into().unwrap()),
            prev_data_page_index: i64::from_le_bytes(buf[29..37].try_into().unwrap()),
            next_data_page_index: i64::from_le_bytes(buf[37..45].try_into().unwrap()),
        }
    }

    fn write_to(&self, buf: &mut [u8]) {
        buf[0] = self.page_identifier;
        buf[1..5].copy_from_slice(&self.total_tuples.to_le_bytes());
        buf[5..9].copy_from_slice(&self.free_slot_count.to_le_bytes());
        buf[9..13].copy_from_slice(&self.next_free_slot_index.to_le_bytes());
        buf[13..21].copy_from_slice(&self.prev_free_page_index.to_le_bytes());
        buf[21..29].copy_from_slice(&self.next_free_page_index.to_le_bytes());
        buf[29..37].copy_from_slice(&self.prev_data_page_index.to_le_bytes());
        buf[37..45].copy_from_slice(&self.next_data_page_index.to_le_bytes());
    }
}

fn data_type_tag(dt: DataType) -> u8 {
    match dt {
        DataType::Int => 0,
        DataType::Float => 1,
        DataType::Str => 2,
        DataType::Bool => 3,
    }
}

fn data_type_from_tag(tag: u8) -> DbResult<DataType> {
    match tag {
        0 => Ok(DataType::Int),
        1 => Ok(DataType::Float),
        2 => Ok(DataType::Str),
        3 => Ok(DataType::Bool),
        other => Err(DbError::InvalidHeader(format!("unknown data type tag {other}"))),
    }
}

fn encode_table_header(
    buf: &mut [u8],
    total_tuples: u32,
    rec_size: u32,
    first_free_page: u64,
    first_free_slot: u32,
    first_data_page: u64,
    schema: &Schema,
) -> DbResult<()> {
    buf[0..4].copy_from_slice(&total_tuples.to_le_bytes());
    buf[4..8].copy_from_slice(&rec_size.to_le_bytes());
    buf[8..16].copy_from_slice(&first_free_page.to_le_bytes());
    buf[16..20].copy_from_slice(&first_free_slot.to_le_bytes());
    buf[20..28].copy_from_slice(&first_data_page.to_le_bytes());
    buf[28..32].copy_from_slice(&(schema.attributes.len() as u32).to_le_bytes());
    buf[32..36].copy_from_slice(&(schema.key_indices.len() as u32).to_le_bytes());

    let mut offset = 36;
    for attr in &schema.attributes {
        let name_bytes = attr.name.as_bytes();
        buf[offset..offset + MAX_ATTR_NAME_LEN].fill(0);
        buf[offset..offset + name_bytes.len()].copy_from_slice(name_bytes);
        buf[offset + MAX_ATTR_NAME_LEN] = data_type_tag(attr.data_type);
        buf[offset + MAX_ATTR_NAME_LEN + 1..offset + TABLE_HEADER_ATTR_SIZE]
            .copy_from_slice(&attr.type_length.to_le_bytes());
        offset += TABLE_HEADER_ATTR_SIZE;
    }
    for &key_idx in &schema.key_indices {
        buf[offset..offset + 4].copy_from_slice(&(key_idx as u32).to_le_bytes());
        offset += 4;
    }
    if offset > PAGE_SIZE {
        return Err(DbError::InvalidHeader(
            "schema does not fit in the table header page".into(),
        ));
    }
    Ok(())
}

#[allow(clippy::type_complexity)]
fn decode_table_header(buf: &[u8]) -> DbResult<(u32, u32, u64, u32, u64, Schema)> {
    let total_tuples = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let rec_size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    let first_free_page = u64::from_le_bytes(buf[8..16].try_into().unwrap());
    let first_free_slot = u32::from_le_bytes(buf[16..20].try_into().unwrap());
    let first_data_page = u64::from_le_bytes(buf[20..28].try_into().unwrap());
    let attribute_count = u32::from_le_bytes(buf[28..32].try_into().unwrap()) as usize;
    let key_count = u32::from_le_bytes(buf[32..36].try_into().unwrap()) as usize;

    let mut offset = 36;
    let mut attributes = Vec::with_capacity(attribute_count);
    for _ in 0..attribute_count {
        let name_bytes = &buf[offset..offset + MAX_ATTR_NAME_LEN];
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(MAX_ATTR_NAME_LEN);
        let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
        let data_type = data_type_from_tag(buf[offset + MAX_ATTR_NAME_LEN])?;
        let type_length = u16::from_le_bytes(
            buf[offset + MAX_ATTR_NAME_LEN + 1..offset + TABLE_HEADER_ATTR_SIZE]
                .try_into()
                .unwrap(),
        );
        attributes.push(Attribute::new(name, data_type, type_length));
        offset += TABLE_HEADER_ATTR_SIZE;
    }
    let mut key_indices = Vec::with_capacity(key_count);
    for _ in 0..key_count {
        key_indices.push(u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize);
        offset += 4;
    }
    let schema = Schema::new(attributes, key_indices)?;
    Ok((total_tuples, rec_size, first_free_page, first_free_slot, first_data_page, schema))
}

/// Slots per data page for a given record size: `(PAGE_SIZE - header) / (rec_size + 2)`.
pub fn slots_per_page(rec_size: usize) -> usize {
    (PAGE_SIZE - PAGE_HEADER_SIZE) / (rec_size + 2)
}

fn slot_offset(rec_size: usize, slot: usize) -> usize {
    PAGE_HEADER_SIZE + slot * (rec_size + 2)
}

/// An open table: its schema, its live buffer pool, and the bookkeeping
/// counters that are otherwise persisted on page 0.
pub struct Table {
    buffer: BufferPool,
    schema: Schema,
    total_tuples: u32,
    rec_size: usize,
    first_free_page: u64,
    first_free_slot: u32,
    first_data_page: u64,
}

impl Table {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn total_tuples(&self) -> u32 {
        self.total_tuples
    }

    pub fn rec_size(&self) -> usize {
        self.rec_size
    }
}

/// Create a new table's backing page file and write its header page.
pub fn create_table(path: impl AsRef<std::path::Path>, schema: &Schema) -> DbResult<()> {
    let path = path.as_ref();
    PageFile::create(path)?;
    let file = PageFile::open(path)?;
    let mut bp = BufferPool::init(file, 3, ReplacementStrategy::Fifo)?;

    let h = bp.pin_page(0)?;
    {
        let buf = bp.frame_data_mut(&h)?;
        encode_table_header(buf, 0, schema.record_size() as u32, 1, 0, 1, schema)?;
    }
    bp.mark_dirty(&h)?;
    bp.unpin_page(&h)?;
    bp.shutdown()
}

/// Open an existing table, reading its schema and counters from page 0 and
/// keeping a buffer pool of `num_frames` frames live for subsequent ops.
pub fn open_table(
    path: impl AsRef<std::path::Path>,
    num_frames: usize,
    strategy: ReplacementStrategy,
) -> DbResult<Table> {
    let file = PageFile::open(path)?;
    let mut bp = BufferPool::init(file, num_frames, strategy)?;

    let h = bp.pin_page(0)?;
    let (total_tuples, rec_size, first_free_page, first_free_slot, first_data_page, schema) = {
        let buf = bp.frame_data(&h)?;
        decode_table_header(buf)?
    };
    bp.unpin_page(&h)?;

    Ok(Table {
        buffer: bp,
        schema,
        total_tuples,
        rec_size: rec_size as usize,
        first_free_page,
        first_free_slot,
        first_data_page,
    })
}

/// Write back the table header page and release the buffer pool.
pub fn close_table(mut table: Table) -> DbResult<()> {
    let h = table.buffer.pin_page(0)?;
    {
        let buf = table.buffer.frame_data_mut(&h)?;
        encode_table_header(
            buf,
            table.total_tuples,
            table.rec_size as u32,
            table.first_free_page,
            table.first_free_slot,
            table.first_data_page,
            &table.schema,
        )?;
    }
    table.buffer.mark_dirty(&h)?;
    table.buffer.unpin_page(&h)?;
    table.buffer.shutdown()
}

/// Remove a table's backing page file from disk.
pub fn delete_table(path: impl AsRef<std::path::Path>) -> DbResult<()> {
    PageFile::destroy(path)
}

/// Append `record` to the table's high-water mark slot, filling in its id.
pub fn insert_record(table: &mut Table, record: &mut Record) -> DbResult<()> {
    let rec_size = table.rec_size;
    let page = table.first_free_page;
    let slot = table.first_free_slot as usize;
    let spp = slots_per_page(rec_size);

    let h = table.buffer.pin_page(page)?;
    {
        let buf = table.buffer.frame_data_mut(&h)?;
        let mut header = PageHeader::read_from(buf);
        if header.page_identifier != b'Y' {
            header = PageHeader {
                page_identifier: b'Y',
                total_tuples: 0,
                free_slot_count: (spp - 1) as u32,
                next_free_slot_index: 1,
                ..PageHeader::uninitialized()
            };
        } else {
            header.free_slot_count = header.free_slot_count.saturating_sub(1);
            header.next_free_slot_index = slot as u32 + 1;
        }
        header.total_tuples += 1;
        header.write_to(buf);

        let offset = slot_offset(rec_size, slot);
        buf[offset] = b'Y';
        buf[offset + 1..offset + 1 + rec_size].copy_from_slice(&record.data);
        buf[offset + 1 + rec_size] = b'|';
    }
    table.buffer.mark_dirty(&h)?;
    table.buffer.unpin_page(&h)?;

    record.id = RecordId {
        page_id: PageId(page),
        slot: slot as u16,
    };

    let next_slot = slot + 1;
    if next_slot >= spp {
        table.first_free_page += 1;
        table.first_free_slot = 0;
    } else {
        table.first_free_slot = next_slot as u32;
    }
    table.total_tuples += 1;
    Ok(())
}

/// Fetch the tuple at `rid`. Fails with `RecordNotFound` if the slot is out
/// of range or has never held a live record.
pub fn get_record(table: &mut Table, rid: RecordId) -> DbResult<Record> {
    let rec_size = table.rec_size;
    let spp = slots_per_page(rec_size);
    if rid.slot as usize >= spp {
        return Err(DbError::RecordNotFound(rid));
    }

    let h = table.buffer.pin_page(rid.page_id.0)?;
    let body = {
        let buf = table.buffer.frame_data(&h)?;
        let offset = slot_offset(rec_size, rid.slot as usize);
        if buf[offset] != b'Y' {
            None
        } else {
            Some(buf[offset + 1..offset + 1 + rec_size].to_vec())
        }
    };
    table.buffer.unpin_page(&h)?;

    match body {
        Some(data) => Ok(Record { id: rid, data }),
        None => Err(DbError::RecordNotFound(rid)),
    }
}

/// Overwrite the body bytes at `record.id` with `record.data`.
pub fn update_record(table: &mut Table, record: &Record) -> DbResult<()> {
    let rid = record.id;
    let rec_size = table.rec_size;
    let spp = slots_per_page(rec_size);
    if rid.slot as usize >= spp {
        return Err(DbError::RecordNotFound(rid));
    }

    let h = table.buffer.pin_page(rid.page_id.0)?;
    let occupied = {
        let buf = table.buffer.frame_data(&h)?;
        let offset = slot_offset(rec_size, rid.slot as usize);
        buf[offset] == b'Y'
    };
    if !occupied {
        table.buffer.unpin_page(&h)?;
        return Err(DbError::RecordNotFound(rid));
    }
    {
        let buf = table.buffer.frame_data_mut(&h)?;
        let offset = slot_offset(rec_size, rid.slot as usize);
        buf[offset + 1..offset + 1 + rec_size].copy_from_slice(&record.data);
    }
    table.buffer.mark_dirty(&h)?;
    table.buffer.unpin_page(&h)?;
    Ok(())
}

/// Mark the slot at `rid` deleted. The slot is never reused by later
/// inserts; `first_free_page`/`first_free_slot` continue past it.
pub fn delete_record(table: &mut Table, rid: RecordId) -> DbResult<()> {
    let rec_size = table.rec_size;
    let spp = slots_per_page(rec_size);
    if rid.slot as usize >= spp {
        return Err(DbError::RecordNotFound(rid));
    }

    let h = table.buffer.pin_page(rid.page_id.0)?;
    let occupied = {
        let buf = table.buffer.frame_data(&h)?;
        let offset = slot_offset(rec_size, rid.slot as usize);
        buf[offset] == b'Y'
    };
    if !occupied {
        table.buffer.unpin_page(&h)?;
        return Err(DbError::RecordNotFound(rid));
    }
    {
        let buf = table.buffer.frame_data_mut(&h)?;
        let offset = slot_offset(rec_size, rid.slot as usize);
        buf[offset] = b'N';
        let mut header = PageHeader::read_from(buf);
        header.total_tuples = header.total_tuples.saturating_sub(1);
        header.free_slot_count += 1;
        header.write_to(buf);
    }
    table.buffer.mark_dirty(&h)?;
    table.buffer.unpin_page(&h)?;

    table.total_tuples = table.total_tuples.saturating_sub(1);
    Ok(())
}

/// Cursor over a table's data pages, in slot order, optionally filtered by
/// a predicate evaluated at each candidate tuple.
pub struct ScanManager {
    total_entries: u32,
    cur_page: u64,
    cur_slot: i64,
    scan_index: u32,
    predicate: Option<Box<dyn Predicate>>,
}

pub fn start_scan(table: &Table, predicate: Option<Box<dyn Predicate>>) -> ScanManager {
    ScanManager {
        total_entries: table.total_tuples,
        cur_page: table.first_data_page,
        cur_slot: -1,
        scan_index: 0,
        predicate,
    }
}

/// Advance the scan to the next matching tuple. Fails with `NoMoreTuples`
/// once every live tuple as of `start_scan` has been visited.
pub fn next(table: &mut Table, scan: &mut ScanManager) -> DbResult<Record> {
    let spp = slots_per_page(table.rec_size);
    loop {
        if scan.scan_index >= scan.total_entries {
            return Err(DbError::NoMoreTuples);
        }
        scan.cur_slot += 1;
        if scan.cur_slot as usize >= spp {
            scan.cur_slot = 0;
            scan.cur_page += 1;
        }
        let rid = RecordId {
            page_id: PageId(scan.cur_page),
            slot: scan.cur_slot as u16,
        };
        match get_record(table, rid) {
            Ok(record) => {
                scan.scan_index += 1;
                match &scan.predicate {
                    Some(pred) if !pred.eval(&record, &table.schema)? => continue,
                    _ => return Ok(record),
                }
            }
            Err(DbError::RecordNotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Release a scan's state. Scans hold no resources beyond the cursor, so
/// this is a no-op kept for symmetry with `start_scan`.
pub fn close_scan(_scan: ScanManager) -> DbResult<()> {
    Ok(())
}

/// Render a batch of records (e.g. collected from a scan) as a table, one
/// column per schema attribute, for debugging and test output.
pub fn render_records(records: &[Record], schema: &Schema) -> DbResult<String> {
    let headers: Vec<&str> = schema.attributes.iter().map(|a| a.name.as_str()).collect();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut row = Vec::with_capacity(schema.attributes.len());
        for idx in 0..schema.attributes.len() {
            row.push(common::pretty::format_value(&record.get_attr(schema, idx)?));
        }
        rows.push(row);
    }
    Ok(common::pretty::render_string_table(
        &headers,
        rows,
        common::pretty::TableStyleKind::Modern,
    ))
}
