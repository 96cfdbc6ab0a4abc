use crate::snapshot::{BatteryStat, PowerInfo};
use crate::sources::devices::{DeviceService, Predicate};
use tracing::debug;

pub fn collect_power(service: &dyn DeviceService) -> Option<PowerInfo> {
    let devices = service.query(&Predicate::battery_or_ac());
    if devices.is_empty() {
        debug!("no battery or AC adapter found");
        return None;
    }

    let mut info = PowerInfo::default();
    for device in devices {
        // With several batteries the last one reported wins.
        if let Some(battery) = device.battery {
            info.battery = Some(BatteryStat {
                present: battery.plugged,
                rechargeable: battery.rechargeable,
                charge_percent: battery.charge_percent,
                charge_state: battery.charge_state,
            });
        } else if let Some(ac) = device.ac_adapter {
            info.ac_plugged = Some(ac.plugged);
        }
    }
    Some(info)
}
