//! End-to-end tests driving a whole in-memory ESP image.
//!
//! The image is written through the crate's `BlockIo` path and read back
//! with a small self-contained FAT32 reader that only looks at raw bytes,
//! so the two sides cannot share bugs.

use espfat::{
    add_path, add_path_with_data, format_name, verify_esp, write_empty_fat32_esp, EntryKind,
    EspGeometry, Fat32Error, FIRST_CONTENT_CLUSTER,
};
use gpt_disk_io::BlockIoAdapter;
use gpt_disk_types::BlockSize;

const START_LBA: u64 = 2048;
const SIZE_LBAS: u32 = 560;
const FAT_SIZE_LBAS: u32 = 8;

fn geom() -> EspGeometry {
    EspGeometry::new(START_LBA, SIZE_LBAS, FAT_SIZE_LBAS)
}

fn new_image() -> Vec<u8> {
    vec![0u8; (START_LBA as usize + SIZE_LBAS as usize) * 512]
}

fn format_image(img: &mut [u8]) {
    let mut io = BlockIoAdapter::new(img, BlockSize::BS_512);
    write_empty_fat32_esp(&mut io, &geom()).unwrap();
}

fn insert(img: &mut [u8], path: &str, data: &[u8]) -> Result<(), Fat32Error> {
    let mut io = BlockIoAdapter::new(img, BlockSize::BS_512);
    add_path_with_data(&mut io, &geom(), path, data)
}

// ---------------------------------------------------------------------------
// Reference reader: independent, byte-level FAT32 navigation
// ---------------------------------------------------------------------------

struct RefVolume<'a> {
    img: &'a [u8],
    fat_offset: usize,
    fat_size_bytes: usize,
    num_fats: usize,
    data_offset: usize,
}

impl<'a> RefVolume<'a> {
    fn parse(img: &'a [u8], start_lba: u64) -> Self {
        let vbr = &img[start_lba as usize * 512..];
        assert_eq!(&vbr[510..512], &[0x55, 0xAA], "boot signature");
        let bytes_per_sector = u16::from_le_bytes([vbr[11], vbr[12]]) as usize;
        assert_eq!(bytes_per_sector, 512);
        assert_eq!(vbr[13], 1, "one sector per cluster");
        let reserved = u16::from_le_bytes([vbr[14], vbr[15]]) as usize;
        let num_fats = vbr[16] as usize;
        let fat_size = u32::from_le_bytes([vbr[36], vbr[37], vbr[38], vbr[39]]) as usize;

        let fat_offset = (start_lba as usize + reserved) * 512;
        Self {
            img,
            fat_offset,
            fat_size_bytes: fat_size * 512,
            num_fats,
            data_offset: fat_offset + num_fats * fat_size * 512,
        }
    }

    fn fat_entry(&self, copy: usize, cluster: u32) -> u32 {
        assert!(copy < self.num_fats);
        let off = self.fat_offset + copy * self.fat_size_bytes + cluster as usize * 4;
        u32::from_le_bytes(self.img[off..off + 4].try_into().unwrap())
    }

    fn cluster_offset(&self, cluster: u32) -> usize {
        self.data_offset + (cluster as usize - 2) * 512
    }

    fn dir_entries(&self, cluster: u32) -> Vec<&'a [u8]> {
        let dir = &self.img[self.cluster_offset(cluster)..self.cluster_offset(cluster) + 512];
        dir.chunks_exact(32).collect()
    }

    /// Find a used entry by its exact 11-byte name field
    fn find(&self, dir_cluster: u32, name: &[u8; 11]) -> Option<&'a [u8]> {
        for entry in self.dir_entries(dir_cluster) {
            if entry[0] == 0 {
                return None;
            }
            if &entry[0..11] == name {
                return Some(entry);
            }
        }
        None
    }

    fn entry_cluster(entry: &[u8]) -> u32 {
        let high = u16::from_le_bytes([entry[20], entry[21]]) as u32;
        let low = u16::from_le_bytes([entry[26], entry[27]]) as u32;
        (high << 16) | low
    }

    fn entry_size(entry: &[u8]) -> u32 {
        u32::from_le_bytes(entry[28..32].try_into().unwrap())
    }

    /// Follow a cluster chain in the first FAT copy until end-of-chain
    fn chain(&self, first: u32) -> Vec<u32> {
        let mut clusters = vec![first];
        loop {
            let next = self.fat_entry(0, *clusters.last().unwrap());
            if next >= 0xFFFF_FFF8 {
                return clusters;
            }
            assert!(next != 0, "chain ran into a free cluster");
            clusters.push(next);
            assert!(clusters.len() < 4096, "unterminated chain");
        }
    }

    fn read_file(&self, entry: &[u8]) -> Vec<u8> {
        let size = Self::entry_size(entry) as usize;
        let mut data = Vec::with_capacity(size);
        for cluster in self.chain(Self::entry_cluster(entry)) {
            let off = self.cluster_offset(cluster);
            let take = (size - data.len()).min(512);
            data.extend_from_slice(&self.img[off..off + take]);
            if data.len() == size {
                break;
            }
        }
        assert_eq!(data.len(), size);
        data
    }

    fn next_free_cursor(&self, start_lba: u64) -> u32 {
        let fsinfo = &self.img[(start_lba as usize + 1) * 512..];
        u32::from_le_bytes(fsinfo[492..496].try_into().unwrap())
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn empty_esp_has_seeded_skeleton() {
    let mut img = new_image();
    format_image(&mut img);

    let vol = RefVolume::parse(&img, START_LBA);

    // Both FAT copies carry the media marker and four EOC seeds
    for copy in 0..2 {
        assert_eq!(vol.fat_entry(copy, 0), 0xFFFF_FFF8);
        for cluster in 1..=4 {
            assert_eq!(vol.fat_entry(copy, cluster), 0xFFFF_FFFF);
        }
        assert_eq!(vol.fat_entry(copy, 5), 0, "cluster 5 starts free");
    }

    let efi = vol.find(2, b"EFI        ").expect("root lists EFI");
    assert_eq!(RefVolume::entry_cluster(efi), 3);
    assert_eq!(RefVolume::entry_size(efi), 0);

    let boot = vol.find(3, b"BOOT       ").expect("/EFI lists BOOT");
    assert_eq!(RefVolume::entry_cluster(boot), 4);

    let dotdot = vol.find(3, b"..         ").expect("/EFI lists ..");
    assert_eq!(RefVolume::entry_cluster(dotdot), 0, "root parent is cluster 0");

    let dotdot = vol.find(4, b"..         ").expect("/EFI/BOOT lists ..");
    assert_eq!(RefVolume::entry_cluster(dotdot), 3);

    assert_eq!(vol.next_free_cursor(START_LBA), 5);

    // Backup VBR is byte-identical to the primary
    let primary = &img[START_LBA as usize * 512..START_LBA as usize * 512 + 512];
    let backup = &img[(START_LBA as usize + 6) * 512..(START_LBA as usize + 6) * 512 + 512];
    assert_eq!(primary, backup);
}

#[test]
fn bootloader_roundtrip() {
    let mut img = new_image();
    format_image(&mut img);

    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    insert(&mut img, "/EFI/BOOT/BOOTX64.EFI", &payload).unwrap();

    let vol = RefVolume::parse(&img, START_LBA);
    let entry = vol
        .find(4, b"BOOTX64 EFI")
        .expect("/EFI/BOOT lists BOOTX64.EFI");
    assert_eq!(entry[11] & 0x10, 0, "file, not directory");
    assert_eq!(RefVolume::entry_size(entry), 5000);

    let chain = vol.chain(RefVolume::entry_cluster(entry));
    assert_eq!(chain.len(), 10, "ceil(5000/512) clusters");
    assert_eq!(chain, (5..15).collect::<Vec<u32>>(), "contiguous run at the cursor");

    assert_eq!(vol.read_file(entry), payload);

    // Both FAT copies got the identical chain
    for cluster in 5..15 {
        assert_eq!(vol.fat_entry(0, cluster), vol.fat_entry(1, cluster));
    }
}

#[test]
fn shared_subdirectory_created_once() {
    let mut img = new_image();
    format_image(&mut img);

    insert(&mut img, "/EFI/BOOT/drivers/a.efi", b"alpha").unwrap();
    insert(&mut img, "/EFI/BOOT/drivers/b.efi", b"bravo").unwrap();

    let vol = RefVolume::parse(&img, START_LBA);
    let drivers_count = vol
        .dir_entries(4)
        .iter()
        .take_while(|e| e[0] != 0)
        .filter(|e| &e[0..11] == b"DRIVERS    ")
        .count();
    assert_eq!(drivers_count, 1, "second insertion reuses the directory");

    let drivers = vol.find(4, b"DRIVERS    ").unwrap();
    assert!(drivers[11] & 0x10 != 0, "directory attribute set");
    let drivers_cluster = RefVolume::entry_cluster(drivers);

    let dotdot = vol.find(drivers_cluster, b"..         ").unwrap();
    assert_eq!(RefVolume::entry_cluster(dotdot), 4);

    let a = vol.find(drivers_cluster, b"A       EFI").unwrap();
    let b = vol.find(drivers_cluster, b"B       EFI").unwrap();
    assert_eq!(vol.read_file(a), b"alpha");
    assert_eq!(vol.read_file(b), b"bravo");
}

#[test]
fn relative_path_rejected_without_writes() {
    let mut img = new_image();
    format_image(&mut img);
    let before = img.clone();

    let result = insert(&mut img, "EFI/BOOT/X.BIN", b"data");
    assert_eq!(result, Err(Fat32Error::MalformedPath));
    assert_eq!(img, before, "no bytes written to the image");

    let result = insert(&mut img, "/EFI//X.BIN", b"data");
    assert_eq!(result, Err(Fat32Error::MalformedPath));
    assert_eq!(img, before);
}

#[test]
fn dot_segments_rejected_without_writes() {
    let mut img = new_image();
    format_image(&mut img);
    let before = img.clone();

    // The seeded ".." entries record the root parent as cluster 0, so
    // navigating them would leave the data region entirely.
    for path in ["/EFI/../X.BIN", "/EFI/./X.BIN", "/./EFI/X.BIN", "/.."] {
        let result = insert(&mut img, path, b"data");
        assert_eq!(result, Err(Fat32Error::MalformedPath), "{path}");
    }
    assert_eq!(img, before, "no bytes written to the image");
}

#[test]
fn zero_byte_file_takes_one_cluster() {
    let mut img = new_image();
    format_image(&mut img);

    insert(&mut img, "/EFI/BOOT/EMPTY.BIN", b"").unwrap();

    let vol = RefVolume::parse(&img, START_LBA);
    let entry = vol.find(4, b"EMPTY   BIN").unwrap();
    assert_eq!(RefVolume::entry_size(entry), 0);
    assert_eq!(RefVolume::entry_cluster(entry), 5);

    // The single cluster is end-of-chain immediately, in both copies
    assert_eq!(vol.fat_entry(0, 5), 0xFFFF_FFFF);
    assert_eq!(vol.fat_entry(1, 5), 0xFFFF_FFFF);
    assert_eq!(vol.next_free_cursor(START_LBA), 6);
    assert_eq!(vol.read_file(entry), b"");
}

#[test]
fn cursor_advances_by_exactly_the_allocated_run() {
    let mut img = new_image();
    format_image(&mut img);
    let vol_cursor = |img: &Vec<u8>| RefVolume::parse(img, START_LBA).next_free_cursor(START_LBA);

    assert_eq!(vol_cursor(&img), FIRST_CONTENT_CLUSTER);

    insert(&mut img, "/EFI/BOOT/TEN.BIN", &[0u8; 5000]).unwrap();
    assert_eq!(vol_cursor(&img), 15, "10 clusters for 5000 bytes");

    // One directory cluster plus one file cluster
    insert(&mut img, "/EFI/BOOT/drivers/a.efi", b"x").unwrap();
    assert_eq!(vol_cursor(&img), 17);

    insert(&mut img, "/EFI/BOOT/drivers/b.efi", b"y").unwrap();
    assert_eq!(vol_cursor(&img), 18);
}

#[test]
fn directory_keeps_zero_terminator_until_full() {
    let mut img = new_image();
    format_image(&mut img);

    // "/EFI/BOOT" starts with "." and "..", leaving 14 free slots
    for i in 0..14 {
        let path = format!("/EFI/BOOT/F{i:02}.BIN");
        insert(&mut img, &path, b"z").unwrap();

        let vol = RefVolume::parse(&img, START_LBA);
        let entries = vol.dir_entries(4);
        let used = entries.iter().take_while(|e| e[0] != 0).count();
        assert_eq!(used, 2 + i + 1);
        assert!(
            entries[used..].iter().all(|e| e.iter().all(|&b| b == 0)),
            "everything after the terminator stays zero"
        );
    }

    let result = insert(&mut img, "/EFI/BOOT/F14.BIN", b"z");
    assert_eq!(result, Err(Fat32Error::DirectoryFull));
}

#[test]
fn descending_through_a_file_is_an_error() {
    let mut img = new_image();
    format_image(&mut img);

    insert(&mut img, "/EFI/BOOT/DATA", b"blob").unwrap();
    let result = insert(&mut img, "/EFI/BOOT/DATA/inner.bin", b"x");
    assert_eq!(result, Err(Fat32Error::NotADirectory));
}

#[test]
fn existing_terminal_entry_is_left_untouched() {
    let mut img = new_image();
    format_image(&mut img);

    insert(&mut img, "/EFI/BOOT/DATA", b"original").unwrap();
    let cursor_before = RefVolume::parse(&img, START_LBA).next_free_cursor(START_LBA);

    insert(&mut img, "/EFI/BOOT/DATA", b"replacement").unwrap();

    let vol = RefVolume::parse(&img, START_LBA);
    assert_eq!(vol.next_free_cursor(START_LBA), cursor_before, "nothing allocated");
    let entry = vol.find(4, b"DATA       ").unwrap();
    assert_eq!(vol.read_file(entry), b"original");
}

#[test]
fn dotted_terminal_reinsert_appends_a_second_entry() {
    let mut img = new_image();
    format_image(&mut img);

    // The positional compare never matches a dotted query against the
    // stored 8.3 field, so a dotted terminal name is re-inserted rather
    // than recognized. Documented behavior of `add_path`.
    insert(&mut img, "/EFI/BOOT/DUP.BIN", b"one").unwrap();
    insert(&mut img, "/EFI/BOOT/DUP.BIN", b"two").unwrap();

    let vol = RefVolume::parse(&img, START_LBA);
    let duplicates = vol
        .dir_entries(4)
        .iter()
        .take_while(|e| e[0] != 0)
        .filter(|e| &e[0..11] == b"DUP     BIN")
        .count();
    assert_eq!(duplicates, 2);
}

#[test]
fn verify_accepts_fresh_image_and_rejects_clobbered_one() {
    let mut img = new_image();
    format_image(&mut img);

    {
        let mut io = BlockIoAdapter::new(img.as_mut_slice(), BlockSize::BS_512);
        verify_esp(&mut io, &geom()).unwrap();
    }

    // Verification still passes after ordinary insertions
    insert(&mut img, "/EFI/BOOT/BOOTX64.EFI", &[1u8; 700]).unwrap();
    {
        let mut io = BlockIoAdapter::new(img.as_mut_slice(), BlockSize::BS_512);
        verify_esp(&mut io, &geom()).unwrap();
    }

    img[START_LBA as usize * 512 + 510] = 0;
    let mut io = BlockIoAdapter::new(img.as_mut_slice(), BlockSize::BS_512);
    assert_eq!(verify_esp(&mut io, &geom()), Err(Fat32Error::CorruptVolume));
}

#[test]
fn add_path_streams_a_real_host_file() {
    let staging = std::env::temp_dir().join(format!("espfat-it-{}", std::process::id()));
    std::fs::create_dir_all(&staging).unwrap();
    let host_file = staging.join("hello.bin");
    let payload: Vec<u8> = (0..700u32).map(|i| (i * 7 % 256) as u8).collect();
    std::fs::write(&host_file, &payload).unwrap();

    let path = host_file.to_str().unwrap().to_owned();
    assert!(path.starts_with('/'), "temp dir must be absolute");

    let mut img = new_image();
    format_image(&mut img);
    {
        let mut io = BlockIoAdapter::new(img.as_mut_slice(), BlockSize::BS_512);
        add_path(&mut io, &geom(), &path).unwrap();
    }

    // Walk the same segments with the reference reader, encoding each
    // name the way the writer does
    let vol = RefVolume::parse(&img, START_LBA);
    let segments: Vec<&str> = path[1..].split('/').collect();
    let mut cluster = 2;
    for dir_segment in &segments[..segments.len() - 1] {
        let field = format_name(dir_segment, EntryKind::Directory);
        let entry = vol.find(cluster, &field).expect("directory materialized");
        cluster = RefVolume::entry_cluster(entry);
    }
    let field = format_name(segments.last().unwrap(), EntryKind::File);
    let entry = vol.find(cluster, &field).expect("file inserted");
    assert_eq!(vol.read_file(entry), payload);

    std::fs::remove_dir_all(&staging).unwrap();
}

#[test]
fn missing_host_file_aborts_insertion() {
    let mut img = new_image();
    format_image(&mut img);

    let mut io = BlockIoAdapter::new(img.as_mut_slice(), BlockSize::BS_512);
    let result = add_path(&mut io, &geom(), "/espfat-no-such-staging-dir/file.bin");
    assert_eq!(result, Err(Fat32Error::HostFileError));
}
