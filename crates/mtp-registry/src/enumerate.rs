//! Interface/endpoint selection (`spec.md` §4.2 "Interface/endpoint
//! selection").
//!
//! Scans configurations → interfaces → altsettings for the first
//! altsetting with exactly three endpoints (two bulk + one interrupt).
//! This module works over a minimal descriptor shape rather than a
//! specific USB library's types, so it can be driven by whatever real
//! backend sits behind [`mtp_transport::UsbTransport`].

/// One endpoint as reported by a USB configuration descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub direction_in: bool,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Bulk,
    Interrupt,
    Other,
}

/// One altsetting's endpoint list, as handed to [`select_interface`].
#[derive(Debug, Clone)]
pub struct AltSetting {
    pub config_value: u8,
    pub interface_number: u8,
    pub altsetting_number: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

/// The chosen interface/altsetting and its three endpoints
/// (`spec.md` §4.2).
#[derive(Debug, Clone, Copy)]
pub struct InterfaceSelection {
    pub config_value: u8,
    pub interface_number: u8,
    pub altsetting_number: u8,
    pub in_ep: u8,
    pub out_ep: u8,
    pub int_ep: u8,
    pub in_max: u16,
    pub out_max: u16,
}

/// Picks the first altsetting across `candidates` with exactly two bulk
/// endpoints (one IN, one OUT) and one interrupt IN endpoint.
pub fn select_interface(candidates: &[AltSetting]) -> Option<InterfaceSelection> {
    for alt in candidates {
        if alt.endpoints.len() != 3 {
            continue;
        }

        let mut bulk_in = None;
        let mut bulk_out = None;
        let mut int_in = None;

        for ep in &alt.endpoints {
            match (ep.transfer_type, ep.direction_in) {
                (TransferType::Bulk, true) if bulk_in.is_none() => bulk_in = Some(*ep),
                (TransferType::Bulk, false) if bulk_out.is_none() => bulk_out = Some(*ep),
                (TransferType::Interrupt, true) if int_in.is_none() => int_in = Some(*ep),
                _ => {}
            }
        }

        if let (Some(bi), Some(bo), Some(ii)) = (bulk_in, bulk_out, int_in) {
            return Some(InterfaceSelection {
                config_value: alt.config_value,
                interface_number: alt.interface_number,
                altsetting_number: alt.altsetting_number,
                in_ep: bi.address,
                out_ep: bo.address,
                int_ep: ii.address,
                in_max: bi.max_packet_size,
                out_max: bo.max_packet_size,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(address: u8, direction_in: bool, ty: TransferType, max: u16) -> EndpointDescriptor {
        EndpointDescriptor {
            address,
            direction_in,
            transfer_type: ty,
            max_packet_size: max,
        }
    }

    #[test]
    fn selects_first_matching_altsetting() {
        let alts = vec![
            AltSetting {
                config_value: 1,
                interface_number: 0,
                altsetting_number: 0,
                endpoints: vec![ep(0x81, true, TransferType::Bulk, 512)], // incomplete
            },
            AltSetting {
                config_value: 1,
                interface_number: 0,
                altsetting_number: 1,
                endpoints: vec![
                    ep(0x81, true, TransferType::Bulk, 512),
                    ep(0x02, false, TransferType::Bulk, 512),
                    ep(0x83, true, TransferType::Interrupt, 8),
                ],
            },
        ];
        let sel = select_interface(&alts).unwrap();
        assert_eq!(sel.altsetting_number, 1);
        assert_eq!(sel.in_ep, 0x81);
        assert_eq!(sel.out_ep, 0x02);
        assert_eq!(sel.int_ep, 0x83);
        assert_eq!(sel.in_max, 512);
    }

    #[test]
    fn rejects_interfaces_without_exactly_three_endpoints() {
        let alts = vec![AltSetting {
            config_value: 1,
            interface_number: 0,
            altsetting_number: 0,
            endpoints: vec![
                ep(0x81, true, TransferType::Bulk, 512),
                ep(0x02, false, TransferType::Bulk, 512),
            ],
        }];
        assert!(select_interface(&alts).is_none());
    }
}
