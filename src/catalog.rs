// System/neutral team, also used for unresolved characters.
pub const NEUTRAL_FACTION_ID: u32 = 0;

pub const FACTIONS: &[(u32, &str)] = &[(1, "VS"), (2, "NC"), (3, "TR"), (4, "NS")];

pub const ZONES: &[(u32, &str)] = &[
    (2, "Indar"),
    (4, "Hossin"),
    (6, "Amerish"),
    (8, "Esamir"),
    (344, "Oshur"),
];

pub const WORLDS: &[(u32, &str)] = &[
    (1, "Connery"),
    (10, "Miller"),
    (13, "Cobalt"),
    (17, "Emerald"),
    (19, "Jaeger"),
    (40, "SolTech"),
];

pub const VEHICLES: &[(u32, &str)] = &[
    (1, "Flash"),
    (2, "Sunderer"),
    (3, "Lightning"),
    (4, "Magrider"),
    (5, "Vanguard"),
    (6, "Prowler"),
    (7, "Scythe"),
    (8, "Reaver"),
    (9, "Mosquito"),
    (10, "Liberator"),
    (11, "Galaxy"),
    (12, "Harasser"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleClass {
    LightGround,
    MainBattleTank,
    Fighter,
    LargeAircraft,
}

pub fn vehicle_class(vehicle_id: u32) -> Option<VehicleClass> {
    match vehicle_id {
        1 | 2 | 3 | 12 => Some(VehicleClass::LightGround),
        4..=6 => Some(VehicleClass::MainBattleTank),
        7..=9 => Some(VehicleClass::Fighter),
        10 | 11 => Some(VehicleClass::LargeAircraft),
        _ => None,
    }
}

pub fn faction_tag(faction_id: u32) -> Option<&'static str> {
    name_for(FACTIONS, faction_id)
}

pub fn zone_name(zone_id: u32) -> Option<&'static str> {
    name_for(ZONES, zone_id)
}

pub fn world_name(world_id: u32) -> Option<&'static str> {
    name_for(WORLDS, world_id)
}

pub fn vehicle_name(vehicle_id: u32) -> Option<&'static str> {
    name_for(VEHICLES, vehicle_id)
}

pub fn faction_id(tag: &str) -> Option<u32> {
    id_for(FACTIONS, tag)
}

pub fn zone_id(name: &str) -> Option<u32> {
    id_for(ZONES, name)
}

pub fn world_id(name: &str) -> Option<u32> {
    id_for(WORLDS, name)
}

pub fn vehicle_id(name: &str) -> Option<u32> {
    id_for(VEHICLES, name)
}

fn name_for(table: &'static [(u32, &'static str)], id: u32) -> Option<&'static str> {
    table
        .iter()
        .find(|(entry_id, _)| *entry_id == id)
        .map(|(_, name)| *name)
}

fn id_for(table: &[(u32, &str)], name: &str) -> Option<u32> {
    let name = name.trim();
    table
        .iter()
        .find(|(_, entry_name)| entry_name.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}
