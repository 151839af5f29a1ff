use std::ops::Range;

/// Channels of the design vector, in storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    X,
    Y,
    Dx,
    Dy,
    Ux,
    Uy,
    /// Workspace violation on x, non-negative.
    Sx,
    /// Workspace violation on y, non-negative.
    Sy,
    /// Risk budget consumed, non-positive.
    S,
}

impl Channel {
    pub const ALL: [Channel; NUM_CHANNELS] = [
        Channel::X,
        Channel::Y,
        Channel::Dx,
        Channel::Dy,
        Channel::Ux,
        Channel::Uy,
        Channel::Sx,
        Channel::Sy,
        Channel::S,
    ];
}

pub const NUM_CHANNELS: usize = 9;
/// Initial condition rows of the equality block.
pub const NUM_INITIAL_CONDITIONS: usize = 6;
/// Collocation defects per transition (position and velocity on both axes).
pub const NUM_DEFECTS: usize = 4;

/// Channel-major layout of the design vector: each channel's node values are contiguous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    nodes: usize,
}

impl Layout {
    pub fn new(nodes: usize) -> Layout {
        Layout { nodes }
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Length of the design vector.
    pub fn len(&self) -> usize {
        NUM_CHANNELS * self.nodes
    }

    pub fn index(&self, channel: Channel, node: usize) -> usize {
        debug_assert!(node < self.nodes);
        channel as usize * self.nodes + node
    }

    pub fn range(&self, channel: Channel) -> Range<usize> {
        let start = channel as usize * self.nodes;
        start..start + self.nodes
    }

    pub fn channel<'a, T>(&self, q: &'a [T], channel: Channel) -> &'a [T] {
        &q[self.range(channel)]
    }

    pub fn n_eq(&self) -> usize {
        NUM_INITIAL_CONDITIONS + NUM_DEFECTS * (self.nodes - 1)
    }

    pub fn n_workspace(&self) -> usize {
        4 * self.nodes
    }

    pub fn n_risk(&self, spline_resolution: usize) -> usize {
        spline_resolution * self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_major_indexing() {
        let layout = Layout::new(5);
        assert_eq!(layout.len(), 45);
        assert_eq!(layout.index(Channel::X, 0), 0);
        assert_eq!(layout.index(Channel::Y, 0), 5);
        assert_eq!(layout.index(Channel::S, 4), 44);
        assert_eq!(layout.range(Channel::Ux), 20..25);

        let q: Vec<usize> = (0..layout.len()).collect();
        assert_eq!(layout.channel(&q, Channel::Sy), &[35, 36, 37, 38, 39]);
    }

    #[test]
    fn row_counts() {
        let layout = Layout::new(5);
        assert_eq!(layout.n_eq(), 6 + 4 * 4);
        assert_eq!(layout.n_workspace(), 20);
        assert_eq!(layout.n_risk(3), 15);
    }

    #[test]
    fn all_channels_in_order() {
        for (i, &c) in Channel::ALL.iter().enumerate() {
            assert_eq!(c as usize, i);
        }
    }
}
