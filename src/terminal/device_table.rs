use crate::protocol::DeviceData;

use super::{StyledText, Tone};

const ID_WIDTH: usize = 10;
const DESCRIPTION_WIDTH: usize = 40;
const BUILD_ID_WIDTH: usize = 20;
const STATUS_WIDTH: usize = 15;

/// Renders a device list as a fixed-width table, sorted by ascending id.
///
/// The header is white; connected rows are green and disconnected rows
/// yellow. Missing descriptions and build ids render as a single space.
pub fn render_device_table(devices: &[DeviceData]) -> StyledText {
    let mut sorted: Vec<&DeviceData> = devices.iter().collect();
    sorted.sort_by_key(|device| device.id);

    let mut table = StyledText::new();
    table.push(
        Tone::Heading,
        format!(
            "{:^ID_WIDTH$}|{:^DESCRIPTION_WIDTH$}|{:^BUILD_ID_WIDTH$}|{:^STATUS_WIDTH$}\n",
            "Device", "Description", "BuildId", "Status"
        ),
    );
    table.push(
        Tone::Heading,
        format!(
            "{}|{}|{}|{}",
            "-".repeat(ID_WIDTH),
            "-".repeat(DESCRIPTION_WIDTH),
            "-".repeat(BUILD_ID_WIDTH),
            "-".repeat(STATUS_WIDTH)
        ),
    );

    for device in sorted {
        let (tone, status) = if device.is_connected {
            (Tone::Connected, "connected")
        } else {
            (Tone::Disconnected, "disconnected")
        };
        table.push(
            tone,
            format!(
                "\n{:<ID_WIDTH$}|{:<DESCRIPTION_WIDTH$}|{:<BUILD_ID_WIDTH$}|{:^STATUS_WIDTH$}",
                format!("Device {}", device.id),
                device.description.as_deref().unwrap_or(" "),
                device.build_id.as_deref().unwrap_or(" "),
                status
            ),
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: i32, description: Option<&str>, is_connected: bool) -> DeviceData {
        DeviceData {
            id,
            description: description.map(str::to_string),
            build_id: None,
            is_connected,
        }
    }

    #[test]
    fn rows_are_sorted_and_coloured_by_status() {
        let table = render_device_table(&[
            device(3, Some("C"), true),
            device(1, Some("A"), false),
        ]);
        let text = table.plain_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("Device 1  |A"));
        assert!(lines[3].starts_with("Device 3  |C"));
        assert!(lines[2].ends_with("| disconnected  "));
        assert!(lines[3].ends_with("|   connected   "));

        let tones: Vec<Tone> = table.segments().iter().map(|(tone, _)| *tone).collect();
        assert_eq!(
            tones,
            vec![Tone::Heading, Tone::Heading, Tone::Disconnected, Tone::Connected]
        );
    }

    #[test]
    fn columns_have_fixed_widths() {
        let text = render_device_table(&[device(12, None, true)]).plain_text();
        let lines: Vec<&str> = text.lines().collect();
        for line in &lines {
            assert_eq!(line.len(), 10 + 1 + 40 + 1 + 20 + 1 + 15);
        }
        assert_eq!(lines[0].matches('|').count(), 3);
        assert_eq!(lines[1].matches('|').count(), 3);
        assert!(lines[1].chars().all(|c| c == '-' || c == '|'));
        assert_eq!(&lines[0][..10], "  Device  ");
        // missing description and build id are a single space, padded
        assert_eq!(&lines[2][11..51], " ".repeat(40));
    }

    #[test]
    fn empty_list_renders_only_the_header() {
        let text = render_device_table(&[]).plain_text();
        assert_eq!(text.lines().count(), 2);
    }
}
