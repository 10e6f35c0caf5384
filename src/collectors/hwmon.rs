use indexmap::IndexMap;
use std::fs::{read_dir, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::collectors::{checked_reading, insert_unique, SensorError, SensorSource};

pub const DEFAULT_HWMON_ROOT: &str = "/sys/class/hwmon";

/// Temperature inputs found under a Linux `hwmon` sysfs tree.
///
/// Every `hwmonX` directory below the root is scanned for `tempN_input`
/// files. A sensor is identified as `<name>/<label>`, where `name` is the
/// content of the chip's `name` file and `label` the content of
/// `tempN_label`, or `tempN` when the chip provides no label.
///
/// ## Doc to Linux kernel API.
///
/// Kernel hwmon API: https://www.kernel.org/doc/html/latest/hwmon/hwmon-kernel-api.html
/// Sysfs interface: https://www.kernel.org/doc/html/latest/hwmon/sysfs-interface.html
pub struct HwmonSource {
    root: PathBuf,
    inputs: IndexMap<String, PathBuf>,
}

impl HwmonSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            inputs: IndexMap::new(),
        }
    }

    fn scan(&mut self) -> io::Result<()> {
        self.inputs.clear();

        let mut chips: Vec<PathBuf> = read_dir(&self.root)?
            .flatten()
            .map(|entry| entry.path())
            .collect();
        chips.sort();

        for chip in chips {
            scan_chip(&chip, &mut self.inputs);
        }
        Ok(())
    }
}

/// Collects the `tempN_input` files of one chip directory into `inputs`.
fn scan_chip(folder: &Path, inputs: &mut IndexMap<String, PathBuf>) {
    let Ok(dir) = read_dir(folder) else {
        return;
    };
    let chip_name = get_file_line(&folder.join("name"), 16).unwrap_or_else(|| {
        folder
            .file_name()
            .and_then(|x| x.to_str())
            .unwrap_or("hwmon")
            .to_string()
    });

    let mut found: Vec<(u32, String)> = dir
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|file_type| !file_type.is_dir()))
        .filter_map(|entry| {
            let filename = entry.file_name().to_str()?.to_string();
            let id = filename
                .strip_prefix("temp")
                .and_then(|f| f.strip_suffix("_input"))
                .and_then(|id| id.parse::<u32>().ok())?;
            Some((id, filename))
        })
        .collect();
    found.sort();

    for (id, filename) in found {
        let label = get_file_line(&folder.join(filename.replace("_input", "_label")), 16)
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| format!("temp{}", id));
        insert_unique(inputs, format!("{}/{}", chip_name, label), folder.join(&filename));
    }
}

impl SensorSource for HwmonSource {
    fn name(&self) -> &'static str {
        "hwmon"
    }

    fn sensors(&mut self) -> Result<Vec<String>, SensorError> {
        self.scan().map_err(|source| SensorError::Io {
            id: self.root.display().to_string(),
            source,
        })?;
        Ok(self.inputs.keys().cloned().collect())
    }

    fn read(&mut self, id: &str) -> Result<f32, SensorError> {
        let path = self
            .inputs
            .get(id)
            .ok_or_else(|| SensorError::NotFound(id.to_string()))?;
        let millidegrees: i32 = read_number_from_file(path).map_err(|source| SensorError::Io {
            id: id.to_string(),
            source,
        })?;
        checked_reading(id, convert_temp_celsius(millidegrees))
    }
}

// Read arbitrary string data.
fn get_file_line(file: &Path, capacity: usize) -> Option<String> {
    let mut reader = String::with_capacity(capacity);
    let mut f = File::open(file).ok()?;
    f.read_to_string(&mut reader).ok()?;
    reader.truncate(reader.trim_end().len());
    Some(reader)
}

/// Reads a `c_long` from a `/sys/class/hwmon` sysfs file.
fn read_number_from_file<N>(file: &Path) -> io::Result<N>
where
    N: std::str::FromStr,
{
    let mut reader = [0u8; 32];
    let mut f = File::open(file)?;
    let n = f.read(&mut reader)?;
    // parse and trim would complain about `\0`.
    let number = std::str::from_utf8(&reader[..n])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        .trim_matches(|c: char| c.is_whitespace() || c == '\0');
    number.parse().map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidData, format!("not a number: {:?}", number))
    })
}

/// Takes a raw temperature in mili-celsius and convert it to celsius.
#[inline]
fn convert_temp_celsius(temp: i32) -> f32 {
    (temp as f32) / 1000f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_tree() -> TempDir {
        let root = tempfile::tempdir().unwrap();

        let cpu = root.path().join("hwmon0");
        fs::create_dir(&cpu).unwrap();
        fs::write(cpu.join("name"), "k10temp\n").unwrap();
        fs::write(cpu.join("temp1_input"), "45250\n").unwrap();
        fs::write(cpu.join("temp1_label"), "Tctl\n").unwrap();
        fs::write(cpu.join("temp3_input"), "0\n").unwrap();
        fs::write(cpu.join("temp1_max"), "90000\n").unwrap();

        let nvme = root.path().join("hwmon1");
        fs::create_dir(&nvme).unwrap();
        fs::write(nvme.join("name"), "nvme\n").unwrap();
        fs::write(nvme.join("temp1_input"), "38850").unwrap();

        root
    }

    #[test]
    fn test_enumerates_inputs() {
        let tree = fake_tree();
        let mut source = HwmonSource::new(tree.path());
        let sensors = source.sensors().unwrap();
        assert_eq!(sensors, vec!["k10temp/Tctl", "k10temp/temp3", "nvme/temp1"]);
    }

    #[test]
    fn test_reads_celsius() {
        let tree = fake_tree();
        let mut source = HwmonSource::new(tree.path());
        source.sensors().unwrap();

        assert_eq!(source.read("k10temp/Tctl").unwrap(), 45.25);
        assert_eq!(source.read("nvme/temp1").unwrap(), 38.85);
    }

    #[test]
    fn test_zero_reading_is_failure() {
        let tree = fake_tree();
        let mut source = HwmonSource::new(tree.path());
        source.sensors().unwrap();
        assert!(matches!(
            source.read("k10temp/temp3"),
            Err(SensorError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_vanished_input_is_io_error() {
        let tree = fake_tree();
        let mut source = HwmonSource::new(tree.path());
        source.sensors().unwrap();
        fs::remove_file(tree.path().join("hwmon1/temp1_input")).unwrap();
        assert!(matches!(source.read("nvme/temp1"), Err(SensorError::Io { .. })));
        assert!(matches!(source.read("nope"), Err(SensorError::NotFound(_))));
    }

    #[test]
    fn test_same_label_on_two_chips() {
        let root = tempfile::tempdir().unwrap();
        for (chip, millidegrees) in [("hwmon0", "35000"), ("hwmon1", "41000")] {
            let dir = root.path().join(chip);
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("name"), "nvme\n").unwrap();
            fs::write(dir.join("temp1_input"), millidegrees).unwrap();
            fs::write(dir.join("temp1_label"), "Composite\n").unwrap();
        }

        let mut source = HwmonSource::new(root.path());
        assert_eq!(source.sensors().unwrap(), vec!["nvme/Composite", "nvme/Composite #2"]);
        assert_eq!(source.read("nvme/Composite").unwrap(), 35.0);
        assert_eq!(source.read("nvme/Composite #2").unwrap(), 41.0);
    }

    #[test]
    fn test_missing_root() {
        let mut source = HwmonSource::new("/nonexistent/hwmon/root");
        assert!(matches!(source.sensors(), Err(SensorError::Io { .. })));
    }
}
