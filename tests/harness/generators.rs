// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for abuse simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of public IP addresses for testing.
///
/// Uses a routable block so the suspicious-IP heuristic (which flags
/// private ranges by default) stays out of rate-limit assertions.
pub fn generate_public_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            let b = ((i >> 16) & 0xFF) as u8;
            let c = ((i >> 8) & 0xFF) as u8;
            let d = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(93, b, c, d))
        })
        .collect()
}

/// Realistic browser user-agents.
pub fn browser_user_agents() -> Vec<&'static str> {
    vec![
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 Chrome/120.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Version/17.0 Mobile Safari",
    ]
}

/// Automation/scraper user-agents that the heuristics should flag.
pub fn bot_user_agents() -> Vec<&'static str> {
    vec![
        "curl/8.4.0",
        "python-requests/2.31.0",
        "Scrapy/2.11 (+https://scrapy.org)",
        "Mozilla/5.0 HeadlessChrome/120.0.0.0",
        "Go-http-client/2.0",
        "facebookexternalhit/1.1 crawlerbot",
    ]
}

/// Chat messages carrying contact/circumvention artifacts.
pub fn contact_messages() -> Vec<&'static str> {
    vec![
        "email me directly at ops@fastjets.example.com",
        "call my cell +1 917 555 0182 after 6pm",
        "whatsapp works best, wa.me/447700900123",
        "book a slot at calendly.com/jet-broker/intro",
        "find me on instagram: @charterdeals_vip",
        "let's do a quick call on zoom.us/j/88112233445",
        "the same tail is cheaper on avinode.com/listing/991",
    ]
}

/// Ordinary deal-chat messages that must pass the guard untouched.
pub fn clean_messages() -> Vec<&'static str> {
    vec![
        "The Challenger 350 is available on the 14th, 9 seats.",
        "Catering is confirmed, wheels up at 0930 local.",
        "Can you share the updated quote for the return leg?",
        "Crew duty limits push departure to the next morning.",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ips_unique_and_public() {
        let ips = generate_public_ips(300);
        assert_eq!(ips.len(), 300);
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 300);
        for ip in &ips {
            match ip {
                IpAddr::V4(v4) => assert!(!v4.is_private() && !v4.is_loopback()),
                IpAddr::V6(_) => panic!("expected v4"),
            }
        }
    }

    #[test]
    fn test_message_pools_nonempty() {
        assert!(!contact_messages().is_empty());
        assert!(!clean_messages().is_empty());
    }
}
