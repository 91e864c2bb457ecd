use crate::hand::{HandLandmarks, index};

const POINT_RADIUS: i32 = 6;
const WRIST_COLOR: [u8; 4] = [59, 130, 246, 255];
const TIP_COLOR: [u8; 4] = [250, 204, 21, 255];
const JOINT_COLOR: [u8; 4] = [239, 68, 68, 255];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(dead_code)]
pub enum CameraFacing {
    Front,
    Back,
}

/// Draws every hand's landmark points onto an RGBA buffer: wrist blue,
/// fingertips yellow, remaining joints red.
///
/// A front camera delivers a feed rotated 180 degrees relative to what the
/// user sees, so both coordinates are flipped before projection. Points that
/// project outside the buffer are clipped.
pub fn draw_landmarks(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    hands: &[HandLandmarks],
    facing: CameraFacing,
) {
    for hand in hands {
        for (i, point) in hand.points().iter().enumerate() {
            let (mut x, mut y) = (point.x, point.y);
            if facing == CameraFacing::Front {
                x = 1.0 - x;
                y = 1.0 - y;
            }

            let px = (x * width as f32) as i32;
            let py = (y * height as f32) as i32;
            draw_circle(buffer, width, height, (px, py), POINT_RADIUS, color_for(i));
        }
    }
}

fn color_for(landmark: usize) -> [u8; 4] {
    match landmark {
        index::WRIST => WRIST_COLOR,
        index::THUMB_TIP | index::INDEX_TIP | index::MIDDLE_TIP | index::RING_TIP
        | index::PINKY_TIP => TIP_COLOR,
        _ => JOINT_COLOR,
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 4;
    if idx + 3 < buffer.len() {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{LANDMARK_COUNT, Landmark};

    const W: u32 = 64;
    const H: u32 = 64;

    fn hand_at(x: f32, y: f32) -> HandLandmarks {
        HandLandmarks::new([Landmark::new(x, y, 0.0); LANDMARK_COUNT])
    }

    fn pixel(buffer: &[u8], x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * W + x) as usize) * 4;
        [
            buffer[idx],
            buffer[idx + 1],
            buffer[idx + 2],
            buffer[idx + 3],
        ]
    }

    #[test]
    fn back_camera_draws_at_projected_position() {
        let mut buffer = vec![0u8; (W * H * 4) as usize];
        draw_landmarks(&mut buffer, W, H, &[hand_at(0.25, 0.25)], CameraFacing::Back);

        // All 21 points coincide; the last drawn index (pinky tip) wins.
        assert_eq!(pixel(&buffer, W / 4, H / 4), TIP_COLOR);
        assert_eq!(pixel(&buffer, 3 * W / 4, 3 * H / 4), [0, 0, 0, 0]);
    }

    #[test]
    fn front_camera_mirrors_both_axes() {
        let mut buffer = vec![0u8; (W * H * 4) as usize];
        draw_landmarks(&mut buffer, W, H, &[hand_at(0.25, 0.25)], CameraFacing::Front);

        assert_eq!(pixel(&buffer, 3 * W / 4, 3 * H / 4), TIP_COLOR);
        assert_eq!(pixel(&buffer, W / 4, H / 4), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_frame_points_clip_without_panic() {
        let mut buffer = vec![0u8; (W * H * 4) as usize];
        draw_landmarks(&mut buffer, W, H, &[hand_at(-0.5, 1.5)], CameraFacing::Back);
        draw_landmarks(&mut buffer, W, H, &[hand_at(0.999, 0.001)], CameraFacing::Back);
    }
}
