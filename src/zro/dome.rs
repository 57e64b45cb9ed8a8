use super::driver::{ShutterCommand, ZroDome};
use crate::api::{Device, DeviceStateItem, Dome, ShutterState};
use crate::{ASCOMError, ASCOMResult};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const NAME: &str = "ZRO Dome";

#[async_trait::async_trait]
impl Device for ZroDome {
    fn static_name(&self) -> &str {
        NAME
    }

    fn unique_id(&self) -> &str {
        Self::unique_id(self)
    }

    fn device_type(&self) -> &str {
        "Dome"
    }

    fn device_number(&self) -> usize {
        self.number()
    }

    async fn connected(&self) -> ASCOMResult<bool> {
        Ok(self.connection_state() == super::ConnectionState::Connected)
    }

    async fn connecting(&self) -> ASCOMResult<bool> {
        Ok(self.connection_state() == super::ConnectionState::Connecting)
    }

    async fn connect(&self) -> ASCOMResult {
        Ok(Self::connect(self).await?)
    }

    async fn disconnect(&self) -> ASCOMResult {
        Self::disconnect(self).await;
        Ok(())
    }

    async fn description(&self) -> ASCOMResult<String> {
        Ok("ZRO observatory dome controlled over MQTT".to_owned())
    }

    async fn driver_info(&self) -> ASCOMResult<String> {
        Ok(format!("ZRO Dome Driver ({})", env!("CARGO_PKG_NAME")))
    }

    async fn driver_version(&self) -> ASCOMResult<String> {
        Ok(concat!(
            env!("CARGO_PKG_VERSION_MAJOR"),
            ".",
            env!("CARGO_PKG_VERSION_MINOR")
        )
        .to_owned())
    }

    async fn interface_version(&self) -> ASCOMResult<i32> {
        Ok(3_i32)
    }

    async fn device_state(&self) -> ASCOMResult<Vec<DeviceStateItem>> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(ASCOMError::unspecified)?;

        let mut items = vec![DeviceStateItem::new("TimeStamp", timestamp)];

        if let Ok(status) = self.status() {
            items.extend(status.state_items());
        }

        Ok(items)
    }
}

#[async_trait::async_trait]
impl Dome for ZroDome {
    async fn altitude(&self) -> ASCOMResult<f64> {
        Ok(self.status()?.altitude)
    }

    async fn at_home(&self) -> ASCOMResult<bool> {
        Ok(self.status()?.at_home)
    }

    async fn at_park(&self) -> ASCOMResult<bool> {
        Ok(self.status()?.at_park)
    }

    async fn azimuth(&self) -> ASCOMResult<f64> {
        Ok(self.status()?.azimuth)
    }

    async fn can_find_home(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_find_home)
    }

    async fn can_park(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_park)
    }

    async fn can_set_altitude(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_set_altitude)
    }

    async fn can_set_azimuth(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_set_azimuth)
    }

    async fn can_set_park(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_set_park)
    }

    async fn can_set_shutter(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_set_shutter)
    }

    async fn can_slave(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_slave)
    }

    async fn can_sync_azimuth(&self) -> ASCOMResult<bool> {
        Ok(self.capabilities().can_sync_azimuth)
    }

    async fn shutter_status(&self) -> ASCOMResult<ShutterState> {
        Ok(self.status()?.shutter)
    }

    async fn slaved(&self) -> ASCOMResult<bool> {
        Ok(Self::slaved(self))
    }

    async fn set_slaved(&self, slaved: bool) -> ASCOMResult {
        Self::set_slaved(self, slaved);
        Ok(())
    }

    async fn slewing(&self) -> ASCOMResult<bool> {
        Ok(self.status()?.slewing)
    }

    async fn abort_slew(&self) -> ASCOMResult {
        Ok(Self::abort_slew(self).await?)
    }

    async fn close_shutter(&self) -> ASCOMResult {
        Ok(self.set_shutter(ShutterCommand::Close).await?)
    }

    async fn find_home(&self) -> ASCOMResult {
        Ok(Self::find_home(self).await?)
    }

    async fn open_shutter(&self) -> ASCOMResult {
        Ok(self.set_shutter(ShutterCommand::Open).await?)
    }

    async fn park(&self) -> ASCOMResult {
        Ok(Self::park(self).await?)
    }

    async fn set_park(&self) -> ASCOMResult {
        Ok(Self::set_park(self).await?)
    }

    async fn slew_to_azimuth(&self, azimuth: f64) -> ASCOMResult {
        Ok(Self::slew_to_azimuth(self, azimuth).await?)
    }
}
