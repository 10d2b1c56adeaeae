use std::fmt::Write as _;

use serde::Serialize;

/// The sample rate used when a device does not report a default one.
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// A single audio device as reported by the platform audio library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// The global index of this device in its enumeration.
    pub index: usize,
    /// `None` if the driver could not report a name.
    pub name: Option<String>,
    /// The name of the host API this device belongs to.
    pub host_api: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: Option<u32>,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

impl DeviceInfo {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unknown>")
    }

    pub fn has_inputs(&self) -> bool {
        self.max_input_channels > 0
    }

    pub fn has_outputs(&self) -> bool {
        self.max_output_channels > 0
    }

    /// The default sample rate of this device, or [`FALLBACK_SAMPLE_RATE`].
    pub fn sample_rate_or_fallback(&self) -> u32 {
        self.default_sample_rate
            .filter(|&sr| sr > 0)
            .unwrap_or(FALLBACK_SAMPLE_RATE)
    }
}

/// The result of enumerating all audio devices, in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList {
    devices: Vec<DeviceInfo>,
}

impl DeviceList {
    /// Construct a list from descriptors.
    ///
    /// The descriptors are re-indexed so that `devices[i].index == i`.
    pub fn new(mut devices: Vec<DeviceInfo>) -> Self {
        for (i, d) in devices.iter_mut().enumerate() {
            d.index = i;
        }

        Self { devices }
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceInfo> {
        self.devices.get(index)
    }

    pub fn default_input(&self) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.is_default_input)
    }

    pub fn default_output(&self) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.is_default_output)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().filter(|d| d.has_inputs())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().filter(|d| d.has_outputs())
    }
}

/// The order in which devices are listed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Enumeration order.
    #[default]
    Index,
    /// Case-insensitive name, ascending.
    Name,
    /// Maximum input channel count, descending.
    In,
    /// Maximum output channel count, descending.
    Out,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [Self::Index, Self::Name, Self::In, Self::Out];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Name => "name",
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSortKey(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown sort key \"{0}\" (expected one of: index, name, in, out)")]
pub struct UnknownSortKey(pub String);

/// Returns the devices in the order given by `key`.
///
/// The sort is stable, so devices with equal keys stay in index order.
pub fn sort_devices(devices: &[DeviceInfo], key: SortKey) -> Vec<&DeviceInfo> {
    let mut sorted: Vec<&DeviceInfo> = devices.iter().collect();

    match key {
        SortKey::Index => sorted.sort_by_key(|d| d.index),
        SortKey::Name => sorted.sort_by_cached_key(|d| {
            d.name.as_deref().unwrap_or_default().to_lowercase()
        }),
        SortKey::In => sorted.sort_by(|a, b| b.max_input_channels.cmp(&a.max_input_channels)),
        SortKey::Out => sorted.sort_by(|a, b| b.max_output_channels.cmp(&a.max_output_channels)),
    }

    sorted
}

/// Format a single line of the text device listing.
pub fn format_device(d: &DeviceInfo, show_sample_rate: bool) -> String {
    let mut line = format!(
        "  [{}] {} - {} | in:{} out:{}",
        d.index,
        d.display_name(),
        d.host_api,
        d.max_input_channels,
        d.max_output_channels
    );

    if show_sample_rate {
        match d.default_sample_rate {
            Some(sr) => {
                let _ = write!(line, " | sr: {}", sr);
            }
            None => line.push_str(" | sr: N/A"),
        }
    }

    let mut marks = Vec::with_capacity(2);
    if d.is_default_input {
        marks.push("default input");
    }
    if d.is_default_output {
        marks.push("default output");
    }
    if !marks.is_empty() {
        let _ = write!(line, " ({})", marks.join(", "));
    }

    line
}

/// Render the full text listing: input devices first, then output devices.
pub fn render_text(list: &DeviceList, key: SortKey, show_sample_rate: bool) -> String {
    let sorted = sort_devices(list.devices(), key);
    let mut s = String::from("Audio input devices:\n");

    for d in sorted.iter().filter(|d| d.has_inputs()) {
        s.push_str(&format_device(d, show_sample_rate));
        s.push('\n');
    }

    s.push_str("\nAudio output devices:\n");

    for d in sorted.iter().filter(|d| d.has_outputs()) {
        s.push_str(&format_device(d, show_sample_rate));
        s.push('\n');
    }

    s
}

#[derive(Serialize)]
struct JsonDevice<'a> {
    index: usize,
    name: Option<&'a str>,
    hostapi: &'a str,
    max_input_channels: u16,
    max_output_channels: u16,
    default_samplerate: Option<u32>,
    is_default_input: bool,
    is_default_output: bool,
}

impl<'a> From<&'a DeviceInfo> for JsonDevice<'a> {
    fn from(d: &'a DeviceInfo) -> Self {
        Self {
            index: d.index,
            name: d.name.as_deref(),
            hostapi: &d.host_api,
            max_input_channels: d.max_input_channels,
            max_output_channels: d.max_output_channels,
            default_samplerate: d.default_sample_rate,
            is_default_input: d.is_default_input,
            is_default_output: d.is_default_output,
        }
    }
}

/// Render the device listing as a pretty-printed JSON array.
pub fn render_json(list: &DeviceList, key: SortKey) -> Result<String, serde_json::Error> {
    let out: Vec<JsonDevice> = sort_devices(list.devices(), key)
        .into_iter()
        .map(JsonDevice::from)
        .collect();

    serde_json::to_string_pretty(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, ins: u16, outs: u16) -> DeviceInfo {
        DeviceInfo {
            index: 0,
            name: Some(name.into()),
            host_api: "ALSA".into(),
            max_input_channels: ins,
            max_output_channels: outs,
            default_sample_rate: Some(48_000),
            is_default_input: false,
            is_default_output: false,
        }
    }

    fn sample_list() -> DeviceList {
        let mut mic = device("USB Mic", 1, 0);
        mic.is_default_input = true;
        let mut speakers = device("speakers", 0, 2);
        speakers.is_default_output = true;
        let mut unnamed = device("", 2, 8);
        unnamed.name = None;
        unnamed.default_sample_rate = None;

        DeviceList::new(vec![
            mic,
            speakers,
            device("HDMI", 0, 8),
            unnamed,
            device("Duplex Interface", 4, 4),
        ])
    }

    fn indices(sorted: &[&DeviceInfo]) -> Vec<usize> {
        sorted.iter().map(|d| d.index).collect()
    }

    #[test]
    fn list_is_reindexed() {
        let list = sample_list();
        for (i, d) in list.devices().iter().enumerate() {
            assert_eq!(d.index, i);
        }
        assert_eq!(list.default_input().unwrap().index, 0);
        assert_eq!(list.default_output().unwrap().index, 1);
        assert_eq!(list.inputs().count(), 3);
        assert_eq!(list.outputs().count(), 4);
    }

    #[test]
    fn sort_by_index() {
        let list = sample_list();
        let sorted = sort_devices(list.devices(), SortKey::Index);
        assert_eq!(indices(&sorted), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sort_by_name_is_case_insensitive() {
        let list = sample_list();
        let sorted = sort_devices(list.devices(), SortKey::Name);

        // The unnamed device sorts as the empty string.
        assert_eq!(indices(&sorted), vec![3, 4, 2, 1, 0]);
    }

    #[test]
    fn sort_by_channels_is_descending_and_stable() {
        let list = sample_list();

        let sorted = sort_devices(list.devices(), SortKey::In);
        assert_eq!(indices(&sorted), vec![4, 3, 0, 1, 2]);

        // HDMI and the unnamed device both have 8 outputs and keep index order.
        let sorted = sort_devices(list.devices(), SortKey::Out);
        assert_eq!(indices(&sorted), vec![2, 3, 4, 1, 0]);
    }

    #[test]
    fn sort_key_from_str() {
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert_eq!("OUT".parse::<SortKey>().unwrap(), SortKey::Out);
        assert!("size".parse::<SortKey>().is_err());
    }

    #[test]
    fn format_device_line() {
        let list = sample_list();

        assert_eq!(
            format_device(list.get(0).unwrap(), false),
            "  [0] USB Mic - ALSA | in:1 out:0 (default input)"
        );
        assert_eq!(
            format_device(list.get(1).unwrap(), true),
            "  [1] speakers - ALSA | in:0 out:2 | sr: 48000 (default output)"
        );
        assert_eq!(
            format_device(list.get(3).unwrap(), true),
            "  [3] <unknown> - ALSA | in:2 out:8 | sr: N/A"
        );

        let mut both = device("Both", 2, 2);
        both.is_default_input = true;
        both.is_default_output = true;
        assert_eq!(
            format_device(&both, false),
            "  [0] Both - ALSA | in:2 out:2 (default input, default output)"
        );
    }

    #[test]
    fn text_listing_groups_inputs_and_outputs() {
        let text = render_text(&sample_list(), SortKey::In, false);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Audio input devices:");
        assert!(lines[1].starts_with("  [4]"));
        assert!(lines[2].starts_with("  [3]"));
        assert!(lines[3].starts_with("  [0]"));
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "Audio output devices:");
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn json_listing() {
        let json = render_json(&sample_list(), SortKey::Out).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let arr = value.as_array().unwrap();

        assert_eq!(arr.len(), 5);
        assert_eq!(arr[0]["index"], 2);
        assert_eq!(arr[0]["name"], "HDMI");
        assert_eq!(arr[0]["hostapi"], "ALSA");
        assert_eq!(arr[1]["name"], serde_json::Value::Null);
        assert_eq!(arr[1]["default_samplerate"], serde_json::Value::Null);
        assert_eq!(arr[3]["is_default_output"], true);
        assert_eq!(arr[4]["max_input_channels"], 1);
        assert!(json.contains("\n  {"));
    }

    #[test]
    fn json_keys_follow_field_order() {
        let json = render_json(&sample_list(), SortKey::Index).unwrap();
        let first = &json[..json.find('}').unwrap()];

        let keys = [
            "index",
            "name",
            "hostapi",
            "max_input_channels",
            "max_output_channels",
            "default_samplerate",
            "is_default_input",
            "is_default_output",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| first.find(&format!("\"{}\":", k)).unwrap())
            .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", first);
        assert_eq!(first.matches("\":").count(), keys.len());
    }
}
