pub mod pcm_device;
