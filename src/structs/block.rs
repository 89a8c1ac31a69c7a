use std::fmt::Display;

use bytemuck::Pod;

use super::*;

const HEXDUMP_WIDTH: usize = 16;

impl Block {
    /// Zero-initialized block with index
    pub fn empty(index: u32, block_size: u32) -> Self {
        Self {
            index,
            data: vec![0; block_size as usize],
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Deserialize a value stored at `position`
    pub fn read_any<T: Pod>(&self, position: usize) -> T {
        bytemuck::pod_read_unaligned(&self.data[position..position + std::mem::size_of::<T>()])
    }

    /// Serialize a value at `position`
    pub fn write_any<T: Pod>(&mut self, position: usize, value: &T) {
        let raw = bytemuck::bytes_of(value);
        self.data[position..position + raw.len()].copy_from_slice(raw);
    }

    /// Copy bytes at `position`, returning the part exceeding the block
    pub fn write_bytes<'a>(&mut self, position: usize, data: &'a [u8]) -> &'a [u8] {
        let fits = usize::min(data.len(), self.data.len() - position);
        self.data[position..position + fits].copy_from_slice(&data[..fits]);
        &data[fits..]
    }
}

impl PermanentIndexed for Block {
    fn load(disk: &mut Disk, index: u32) -> Result<Self, Error> {
        let mut block = Self::empty(index, disk.block_size());
        disk.read_block(index, &mut block.data)?;
        Ok(block)
    }

    fn flush(&self, disk: &mut Disk) -> Result<(), Error> {
        disk.write_block(self.index, &self.data)
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Block {}", self.index)?;
        for (row, chunk) in self.data.chunks(HEXDUMP_WIDTH).enumerate() {
            write!(f, "{:08x} ", row * HEXDUMP_WIDTH)?;
            for byte in chunk {
                write!(f, " {byte:02x}")?;
            }
            let text = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect::<String>();
            writeln!(f, "  |{text}|")?;
        }
        Ok(())
    }
}
