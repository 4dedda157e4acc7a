//! SVG candlestick chart.
//!
//! Draws the most recent `zoom_candles` candles, widened when needed so the
//! whole prediction zone stays in view. The price axis spans the visible
//! lows and highs plus a 1% buffer.

use crate::domain::error::CandlecallError;
use crate::domain::ohlcv::Candle;
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_ZOOM_CANDLES: usize = 60;
const PRICE_BUFFER: f64 = 0.01;
const PADDING: f64 = 40.0;

pub struct SvgChartAdapter {
    pub zoom_candles: usize,
    pub width: f64,
    pub height: f64,
}

impl Default for SvgChartAdapter {
    fn default() -> Self {
        Self {
            zoom_candles: DEFAULT_ZOOM_CANDLES,
            width: 900.0,
            height: 420.0,
        }
    }
}

impl SvgChartAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = Self::default();
        Self {
            zoom_candles: config
                .get_int("chart", "zoom_candles", DEFAULT_ZOOM_CANDLES as i64)
                .max(1) as usize,
            width: config.get_double("chart", "width", defaults.width),
            height: config.get_double("chart", "height", defaults.height),
        }
    }

    /// First candle index to draw.
    fn visible_start(&self, len: usize, highlight_from: Option<usize>) -> usize {
        let zoom_start = len.saturating_sub(self.zoom_candles);
        match highlight_from {
            Some(h) if h < len => zoom_start.min(h.saturating_sub(1)),
            _ => zoom_start,
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl ChartPort for SvgChartAdapter {
    fn render(
        &self,
        candles: &[Candle],
        highlight_from: Option<usize>,
        title: &str,
    ) -> Result<String, CandlecallError> {
        let width = self.width;
        let height = self.height;
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}">
<rect width="100%" height="100%" fill="white"/>
<text x="{PADDING:.0}" y="24" font-family="sans-serif" font-size="16">{}</text>
"#,
            escape(title)
        );

        if candles.is_empty() {
            svg.push_str(&format!(
                r#"<text x="{:.0}" y="{:.0}" font-family="sans-serif" text-anchor="middle">No data available.</text>
"#,
                width / 2.0,
                height / 2.0
            ));
            svg.push_str("</svg>\n");
            return Ok(svg);
        }

        let start = self.visible_start(candles.len(), highlight_from);
        let visible = &candles[start..];

        let low = visible.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high = visible
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let y_min = low * (1.0 - PRICE_BUFFER);
        let y_max = high * (1.0 + PRICE_BUFFER);
        let range = y_max - y_min;

        let plot_width = width - 2.0 * PADDING;
        let plot_height = height - 2.0 * PADDING;
        let slot = plot_width / visible.len() as f64;
        let body_width = (slot * 0.7).max(1.0);

        let y = |price: f64| {
            if range > 0.0 {
                height - PADDING - (price - y_min) / range * plot_height
            } else {
                height / 2.0
            }
        };

        if let Some(h) = highlight_from.filter(|&h| h < candles.len()) {
            let x0 = PADDING + (h - start) as f64 * slot;
            svg.push_str(&format!(
                r#"<rect class="prediction-zone" x="{x0:.1}" y="{PADDING:.1}" width="{:.1}" height="{plot_height:.1}" fill="yellow" fill-opacity="0.2"/>
<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="12">Prediction Zone</text>
"#,
                width - PADDING - x0,
                x0 + 4.0,
                PADDING + 14.0
            ));
        }

        let axis_y = height - PADDING;
        svg.push_str(&format!(
            r#"<line x1="{PADDING:.1}" y1="{axis_y:.1}" x2="{:.1}" y2="{axis_y:.1}" stroke="black"/>
<text x="4" y="{:.1}" font-family="sans-serif" font-size="10">{high:.2}</text>
<text x="4" y="{:.1}" font-family="sans-serif" font-size="10">{low:.2}</text>
"#,
            width - PADDING,
            y(high),
            y(low)
        ));

        for (i, candle) in visible.iter().enumerate() {
            let center = PADDING + (i as f64 + 0.5) * slot;
            let color = if candle.close >= candle.open {
                "green"
            } else {
                "red"
            };
            let top = y(candle.open.max(candle.close));
            let bottom = y(candle.open.min(candle.close));

            svg.push_str(&format!(
                r#"<line x1="{center:.1}" y1="{:.1}" x2="{center:.1}" y2="{:.1}" stroke="{color}"/>
<rect class="candle" x="{:.1}" y="{top:.1}" width="{body_width:.1}" height="{:.1}" fill="{color}"/>
"#,
                y(candle.high),
                y(candle.low),
                center - body_width / 2.0,
                (bottom - top).max(1.0)
            ));
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }
}
